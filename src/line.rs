use crate::buffer::{SampleBuffer, GUARD_SAMPLES};
use crate::controller::DelayTimeController;
use crate::error::DelayError;
use crate::interpolation::read_fractional;

/// A circular buffer together with the controller that decides where to read
/// from it.
#[derive(Debug, Clone)]
pub struct DelayLine<B: SampleBuffer> {
    buffer: B,
    controller: DelayTimeController,
}

impl<B: SampleBuffer> DelayLine<B> {
    pub fn new(buffer: B, controller: DelayTimeController) -> Self {
        Self { buffer, controller }
    }

    /// Grows the buffer to the controller's current requirement and bounds
    /// the controller by what the buffer can serve.
    ///
    /// On allocation failure the old buffer is kept and the limits still
    /// describe it, so reads stay in range.
    pub fn configure(&mut self) -> Result<bool, DelayError> {
        let result = self.buffer.ensure_capacity(
            self.controller.required_samples(),
            self.controller.block_size(),
        );
        let max_delay = self.buffer.capacity().saturating_sub(GUARD_SAMPLES) as f32;
        let min_delay = self.controller.min_delay().min(max_delay);
        self.controller.set_limits(min_delay, max_delay);
        result
    }

    /// True when the buffer holds the configured length plus one block.
    pub fn has_safe_span(&self) -> bool {
        self.controller.required_samples() + self.controller.block_size()
            <= self.buffer.capacity()
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer.advance_write(sample);
    }

    #[inline]
    pub fn read_integer(&self, delay: usize) -> f32 {
        self.buffer.history(delay)
    }

    #[inline]
    pub fn read_interpolated(&self, position: f32) -> f32 {
        read_fractional(&self.buffer, position)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn controller(&self) -> &DelayTimeController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DelayTimeController {
        &mut self.controller
    }
}
