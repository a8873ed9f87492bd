use std::any::Any;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::audio::AudioInput;
use crate::buffer::{GuardedBuffer, SampleBuffer};
use crate::controller::{DelayRounding, DelayTimeController};
use crate::error::DelayError;
use crate::interpolation::MIN_INTERPOLATED_DELAY;
use crate::line::DelayLine;
use crate::params::DelayParam;
use crate::traits::{DelayNode, PortId, PrepareContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    #[default]
    Integer,
    Cubic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// No block parameters yet; output is silent.
    Uninitialized,
    Configured,
    Running,
}

/// One input, one delayed output.
///
/// Each sample is written first and then read `delay` samples back, so a
/// delay of `d` gives `y[t] = x[t - d]`.
pub struct SingleLineDelay {
    line: DelayLine<GuardedBuffer>,
    mode: ReadMode,
    state: LineState,
    active: bool,
}

impl SingleLineDelay {
    pub fn new(max_delay_ms: f32, delay_ms: f32, mode: ReadMode) -> Self {
        let controller = match mode {
            ReadMode::Integer => DelayTimeController::new(max_delay_ms, delay_ms),
            ReadMode::Cubic => DelayTimeController::new(max_delay_ms, delay_ms)
                .with_rounding(DelayRounding::Fractional)
                .with_min_delay(MIN_INTERPOLATED_DELAY),
        };
        Self {
            line: DelayLine::new(GuardedBuffer::new(), controller),
            mode,
            state: LineState::Uninitialized,
            active: true,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn delay_samples(&self) -> f32 {
        self.line.controller().delay_samples()
    }

    pub fn capacity(&self) -> usize {
        self.line.buffer().capacity()
    }

    fn configure(&mut self) -> Result<(), DelayError> {
        self.line.configure()?;
        Ok(())
    }

    #[inline]
    fn read(&self, delay: f32) -> f32 {
        match self.mode {
            ReadMode::Integer => self.line.read_integer(delay as usize + 1),
            ReadMode::Cubic => self.line.read_interpolated(delay + 1.0),
        }
    }

    #[inline]
    fn read_current(&mut self) -> f32 {
        let delay = self.line.controller().delay_samples();
        let ramp = self.line.controller_mut().ramp_mut();
        if ramp.is_active() {
            let previous = ramp.previous_delay();
            let (target_weight, previous_weight) = ramp.next_weights();
            target_weight * self.read(delay) + previous_weight * self.read(previous)
        } else {
            self.read(delay)
        }
    }
}

impl DelayNode for SingleLineDelay {
    fn get_ports(&self) -> FxHashMap<PortId, bool> {
        let mut ports = FxHashMap::default();
        ports.insert(PortId::AudioInput0, false);
        ports.insert(PortId::AudioOutput0, true);
        ports
    }

    fn prepare(&mut self, ctx: &mut PrepareContext<'_>) {
        let changed = match self
            .line
            .controller_mut()
            .on_system_params_changed(ctx.block_size, ctx.sample_rate)
        {
            Ok(changed) => changed,
            Err(err) => {
                ctx.report(self.node_type(), err);
                return;
            }
        };
        if changed || self.state == LineState::Uninitialized {
            if let Err(err) = self.configure() {
                ctx.report(self.node_type(), err);
            }
            self.state = LineState::Configured;
        }
    }

    fn process(
        &mut self,
        inputs: &FxHashMap<PortId, &[f32]>,
        outputs: &mut FxHashMap<PortId, &mut [f32]>,
        buffer_size: usize,
    ) {
        let Some(output) = outputs.get_mut(&PortId::AudioOutput0) else {
            return;
        };
        let n = buffer_size.min(output.len());
        let output = &mut output[..n];

        if self.state == LineState::Uninitialized || !self.line.has_safe_span() {
            output.fill(0.0);
            return;
        }
        self.state = LineState::Running;

        let input = AudioInput::new(inputs.get(&PortId::AudioInput0).copied(), 0.0);
        for (i, sample) in output.iter_mut().enumerate() {
            self.line.write(input.get(i));
            *sample = self.read_current();
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.line.controller_mut().ramp_mut().finish();
    }

    fn apply_param(&mut self, param: DelayParam) -> Result<(), DelayError> {
        match param {
            DelayParam::DelayMs(ms) => {
                self.line.controller_mut().set_delay_ms(ms);
                Ok(())
            }
            DelayParam::MaxDelayMs(ms) => {
                self.line.controller_mut().set_buffer_ms(ms);
                if self.line.controller().is_configured() {
                    self.configure()?;
                }
                Ok(())
            }
            DelayParam::RampMs(ms) => {
                self.line.controller_mut().set_ramp_ms(ms);
                Ok(())
            }
            DelayParam::Clear => {
                self.line.clear();
                Ok(())
            }
            other => Err(DelayError::UnsupportedParam {
                node: self.node_type(),
                param: other.name(),
            }),
        }
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
        "delay"
    }
}
