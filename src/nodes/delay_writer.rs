use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::audio::AudioInput;
use crate::buffer::{GuardedBuffer, SampleBuffer};
use crate::controller::{DelayTimeController, SystemParamsPolicy};
use crate::error::DelayError;
use crate::line::DelayLine;
use crate::params::DelayParam;
use crate::traits::{DelayNode, PortId, PrepareContext};

/// Buffer shared between one writer and its readers.
///
/// Only the writer mutates the samples; readers borrow it immutably while the
/// graph runs them one after the other.
pub type SharedWriter = Rc<RefCell<DelayWriterState>>;

#[derive(Debug)]
pub struct DelayWriterState {
    line: DelayLine<GuardedBuffer>,
    epoch: Option<u64>,
}

impl DelayWriterState {
    pub fn new(max_delay_ms: f32) -> Self {
        Self {
            line: DelayLine::new(
                GuardedBuffer::new(),
                DelayTimeController::new(max_delay_ms, 0.0),
            ),
            epoch: None,
        }
    }

    /// Brings the buffer in line with announced block parameters. Returns
    /// `Ok(true)` when the buffer was reallocated.
    ///
    /// The first check of an epoch adopts `block_size` and `sample_rate`;
    /// later checks in the same epoch can only raise them, so a reader
    /// announcing smaller values never shrinks what the writer relies on.
    pub fn check(
        &mut self,
        block_size: usize,
        sample_rate: f32,
        epoch: u64,
    ) -> Result<bool, DelayError> {
        let policy = if self.epoch == Some(epoch) {
            SystemParamsPolicy::RaiseOnly
        } else {
            SystemParamsPolicy::Track
        };
        self.epoch = Some(epoch);

        let controller = self.line.controller_mut();
        controller.set_policy(policy);
        if controller.on_system_params_changed(block_size, sample_rate)? {
            self.line.configure()
        } else {
            Ok(false)
        }
    }

    pub fn set_max_delay_ms(&mut self, max_delay_ms: f32) -> Result<bool, DelayError> {
        self.line.controller_mut().set_buffer_ms(max_delay_ms);
        if self.line.controller().is_configured() {
            self.line.configure()
        } else {
            Ok(false)
        }
    }

    pub fn write_block(&mut self, input: AudioInput<'_>, buffer_size: usize) {
        for i in 0..buffer_size {
            self.line.write(input.get(i));
        }
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }

    pub fn buffer(&self) -> &GuardedBuffer {
        self.line.buffer()
    }

    pub fn capacity(&self) -> usize {
        self.line.buffer().capacity()
    }

    /// False after a failed growth left the buffer shorter than configured.
    pub fn has_safe_span(&self) -> bool {
        self.line.has_safe_span()
    }

    pub fn block_size(&self) -> usize {
        self.line.controller().block_size()
    }

    pub fn sample_rate(&self) -> f32 {
        self.line.controller().sample_rate()
    }

    pub fn max_delay_ms(&self) -> f32 {
        self.line.controller().buffer_ms()
    }
}

/// Owns a named delay buffer and writes its input into it every block.
pub struct DelayWriter {
    name: String,
    state: SharedWriter,
    active: bool,
}

impl DelayWriter {
    pub fn new(name: &str, max_delay_ms: f32) -> Self {
        Self {
            name: name.to_string(),
            state: Rc::new(RefCell::new(DelayWriterState::new(max_delay_ms))),
            active: true,
        }
    }

    pub fn state(&self) -> &SharedWriter {
        &self.state
    }
}

impl DelayNode for DelayWriter {
    fn get_ports(&self) -> FxHashMap<PortId, bool> {
        let mut ports = FxHashMap::default();
        ports.insert(PortId::AudioInput0, false);
        ports
    }

    fn prepare(&mut self, ctx: &mut PrepareContext<'_>) {
        let mut state = self.state.borrow_mut();
        if let Err(err) = state.check(ctx.block_size, ctx.sample_rate, ctx.epoch) {
            ctx.report(&self.name, err);
        }
        let capacity = state.capacity();
        if ctx.block_size > capacity {
            ctx.report(
                &self.name,
                DelayError::BlockExceedsCapacity {
                    block_size: ctx.block_size,
                    capacity,
                },
            );
        }
    }

    fn process(
        &mut self,
        inputs: &FxHashMap<PortId, &[f32]>,
        _outputs: &mut FxHashMap<PortId, &mut [f32]>,
        buffer_size: usize,
    ) {
        let input = AudioInput::new(inputs.get(&PortId::AudioInput0).copied(), 0.0);
        self.state.borrow_mut().write_block(input, buffer_size);
    }

    fn reset(&mut self) {
        self.state.borrow_mut().clear();
    }

    fn apply_param(&mut self, param: DelayParam) -> Result<(), DelayError> {
        match param {
            DelayParam::MaxDelayMs(ms) => {
                self.state.borrow_mut().set_max_delay_ms(ms)?;
                Ok(())
            }
            DelayParam::Clear => {
                self.state.borrow_mut().clear();
                Ok(())
            }
            other => Err(DelayError::UnsupportedParam {
                node: self.node_type(),
                param: other.name(),
            }),
        }
    }

    fn shared_writer(&self) -> Option<(String, SharedWriter)> {
        Some((self.name.clone(), Rc::clone(&self.state)))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn node_type(&self) -> &'static str {
        "delay_writer"
    }

    fn name(&self) -> &str {
        &self.name
    }
}
