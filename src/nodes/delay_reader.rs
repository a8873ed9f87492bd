use std::any::Any;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::delay_writer::SharedWriter;
use crate::audio::AudioInput;
use crate::buffer::SampleBuffer;
use crate::error::DelayError;
use crate::interpolation::{read_fractional, MIN_INTERPOLATED_DELAY};
use crate::params::DelayParam;
use crate::traits::{DelayNode, PortId, PrepareContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderMode {
    /// Whole-sample delay, read as one contiguous block.
    #[default]
    Integer,
    /// Per-sample delay from the `DelayTimeMod` port, cubic interpolated.
    Interpolated,
}

/// Samples a reader has to add back when it runs before its writer in the
/// same cycle: the writer has not produced the current block yet.
pub fn zero_delay_adjustment(reader_order: usize, writer_order: usize, block_size: usize) -> usize {
    if reader_order < writer_order {
        block_size
    } else {
        0
    }
}

/// Reads a named writer's buffer at a delay.
pub struct DelayReader {
    writer_name: String,
    writer: Option<SharedWriter>,
    mode: ReaderMode,
    delay_ms: f32,
    samples_per_ms: f32,
    block_size: usize,
    adjustment: usize,
    active: bool,
}

impl DelayReader {
    pub fn new(writer_name: &str, delay_ms: f32, mode: ReaderMode) -> Self {
        Self {
            writer_name: writer_name.to_string(),
            writer: None,
            mode,
            delay_ms: delay_ms.max(0.0),
            samples_per_ms: 0.0,
            block_size: 0,
            adjustment: 0,
            active: true,
        }
    }

    pub fn writer_name(&self) -> &str {
        &self.writer_name
    }

    pub fn is_resolved(&self) -> bool {
        self.writer.is_some()
    }

    pub fn adjustment(&self) -> usize {
        self.adjustment
    }

    fn read_integer(&self, writer: &SharedWriter, output: &mut [f32]) {
        let state = writer.borrow();
        let buffer = state.buffer();
        let capacity = buffer.capacity();
        let n = output.len();

        let delay = (self.delay_ms * self.samples_per_ms + 0.5) as usize;
        let offset = (delay + n)
            .saturating_sub(self.adjustment)
            .clamp(n, capacity);
        let start = buffer.write_phase() as isize - offset as isize;

        for (i, sample) in output.iter_mut().enumerate() {
            *sample = buffer.read_at(start + i as isize);
        }
    }

    fn read_interpolated(&self, writer: &SharedWriter, delay_ms: AudioInput<'_>, output: &mut [f32]) {
        let state = writer.borrow();
        let buffer = state.buffer();
        let n = output.len();
        let limit = buffer.capacity().saturating_sub(n + 4) as f32;
        let adjustment = self.adjustment as f32;

        for (i, sample) in output.iter_mut().enumerate() {
            let delay = (self.samples_per_ms * delay_ms.get(i) - adjustment)
                .min(limit)
                .max(MIN_INTERPOLATED_DELAY);
            *sample = read_fractional(buffer, delay + (n - i) as f32);
        }
    }
}

impl DelayNode for DelayReader {
    fn get_ports(&self) -> FxHashMap<PortId, bool> {
        let mut ports = FxHashMap::default();
        ports.insert(PortId::DelayTimeMod, false);
        ports.insert(PortId::AudioOutput0, true);
        ports
    }

    fn prepare(&mut self, ctx: &mut PrepareContext<'_>) {
        self.block_size = ctx.block_size;
        self.samples_per_ms = ctx.sample_rate * 0.001;
        self.writer = None;

        let registry = ctx.registry;
        let Some(entry) = registry.resolve(&self.writer_name) else {
            ctx.report(
                "delay_reader",
                DelayError::UnknownWriter(self.writer_name.clone()),
            );
            return;
        };

        let writer_order = ctx.order_of(entry.node).unwrap_or(0);
        self.adjustment = zero_delay_adjustment(ctx.order, writer_order, ctx.block_size);

        let capacity = {
            let mut state = entry.state.borrow_mut();
            if let Err(err) = state.check(ctx.block_size, ctx.sample_rate, ctx.epoch) {
                ctx.report(&self.writer_name, err);
            }
            state.capacity()
        };
        if ctx.block_size > capacity {
            ctx.report(
                &self.writer_name,
                DelayError::BlockExceedsCapacity {
                    block_size: ctx.block_size,
                    capacity,
                },
            );
        }
        self.writer = Some(entry.state.clone());
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

        let Some(writer) = &self.writer else {
            output.fill(0.0);
            return;
        };
        {
            let state = writer.borrow();
            if output.len() > state.capacity() || !state.has_safe_span() {
                output.fill(0.0);
                return;
            }
        }

        match self.mode {
            ReaderMode::Integer => self.read_integer(writer, output),
            ReaderMode::Interpolated => {
                let delay_ms =
                    AudioInput::new(inputs.get(&PortId::DelayTimeMod).copied(), self.delay_ms);
                self.read_interpolated(writer, delay_ms, output);
            }
        }
    }

    fn reset(&mut self) {}

    fn apply_param(&mut self, param: DelayParam) -> Result<(), DelayError> {
        match param {
            DelayParam::DelayMs(ms) => {
                self.delay_ms = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
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
        "delay_reader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_adjustment() {
        assert_eq!(zero_delay_adjustment(1, 2, 64), 64);
        assert_eq!(zero_delay_adjustment(3, 2, 64), 0);
    }

    #[test]
    fn test_unresolved_reader_is_silent() {
        let mut reader = DelayReader::new("missing", 10.0, ReaderMode::Integer);
        let inputs = FxHashMap::default();
        let mut out = vec![1.0; 16];
        {
            let mut outputs = FxHashMap::default();
            outputs.insert(PortId::AudioOutput0, out.as_mut_slice());
            reader.process(&inputs, &mut outputs, 16);
        }
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(!reader.is_resolved());
    }

    #[test]
    fn test_negative_delay_is_clamped() {
        let mut reader = DelayReader::new("buf", -5.0, ReaderMode::Integer);
        assert_eq!(reader.delay_ms, 0.0);
        reader.apply_param(DelayParam::DelayMs(f32::NAN)).unwrap();
        assert_eq!(reader.delay_ms, 0.0);
        assert!(reader.apply_param(DelayParam::Feedback(0.5)).is_err());
    }
}
