use log::debug;

use super::{sanitize, zeroed, SampleBuffer};
use crate::error::DelayError;

pub const INITIAL_MASKED_CAPACITY: usize = 1024;

/// Power-of-two ring buffer addressed with `index & (len - 1)`.
#[derive(Debug, Clone)]
pub struct MaskedBuffer {
    data: Vec<f32>,
    mask: usize,
    write_phase: usize,
}

impl MaskedBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_MASKED_CAPACITY)
    }

    /// `capacity` is rounded up to the next power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        let len = capacity.max(1).next_power_of_two();
        Self {
            data: vec![0.0; len],
            mask: len - 1,
            write_phase: 0,
        }
    }
}

impl Default for MaskedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer for MaskedBuffer {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn write_phase(&self) -> usize {
        self.write_phase
    }

    /// Doubles until `required_samples + block_size` fits.
    fn ensure_capacity(
        &mut self,
        required_samples: usize,
        block_size: usize,
    ) -> Result<bool, DelayError> {
        let needed = required_samples
            .max(1)
            .checked_add(block_size)
            .and_then(usize::checked_next_power_of_two)
            .ok_or(DelayError::Allocation {
                requested: usize::MAX,
            })?;

        if needed <= self.data.len() {
            return Ok(false);
        }

        self.data = zeroed(needed)?;
        self.mask = needed - 1;
        self.write_phase = 0;
        debug!("masked delay buffer grown to {} samples", needed);
        Ok(true)
    }

    #[inline]
    fn advance_write(&mut self, sample: f32) {
        self.data[self.write_phase] = sanitize(sample);
        self.write_phase = (self.write_phase + 1) & self.mask;
    }

    #[inline]
    fn read_at(&self, phase: isize) -> f32 {
        // Two's complement keeps negative phases on the right slot.
        self.data[(phase as usize) & self.mask]
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
    }
}
