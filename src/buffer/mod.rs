//! Circular sample storage for delay lines.
//!
//! Two addressing strategies sit behind [`SampleBuffer`]:
//!
//! - [`GuardedBuffer`] keeps four mirrored samples in front of the logical
//!   start, so a backward window of four samples is always one contiguous
//!   slice. Any capacity that is a multiple of four works.
//! - [`MaskedBuffer`] uses a power-of-two length and wraps with a bitmask.
//!
//! Positions are expressed as *history indices*: `history(1)` is the sample
//! written most recently, `history(k)` the one written `k` writes ago.

mod guarded;
mod masked;

pub use guarded::GuardedBuffer;
pub use masked::{MaskedBuffer, INITIAL_MASKED_CAPACITY};

use crate::error::DelayError;

/// Samples mirrored below the logical start of a guarded buffer.
pub const GUARD_SAMPLES: usize = 4;

/// Guarded capacities are rounded up to a multiple of this.
pub const CAPACITY_QUANTUM: usize = 4;

/// Replaces NaN, infinities and subnormals with silence.
#[inline(always)]
pub fn sanitize(sample: f32) -> f32 {
    if sample.is_normal() {
        sample
    } else {
        0.0
    }
}

pub trait SampleBuffer {
    /// Logical length in samples (excluding any guard region).
    fn capacity(&self) -> usize;

    /// Index of the next sample to be written.
    fn write_phase(&self) -> usize;

    /// Grows the buffer so it can hold `required_samples` plus one block.
    ///
    /// Returns `Ok(true)` when storage was reallocated. Growth zero-fills the
    /// buffer and resets the write phase; it never shrinks. On allocation
    /// failure the previous storage is kept untouched.
    fn ensure_capacity(
        &mut self,
        required_samples: usize,
        block_size: usize,
    ) -> Result<bool, DelayError>;

    /// Stores a sanitized sample and moves the write phase forward.
    fn advance_write(&mut self, sample: f32);

    /// Reads a physical position, folding out-of-range phases back by one
    /// capacity. Positions that are still outside the buffer read as silence.
    fn read_at(&self, phase: isize) -> f32;

    /// Zeroes the contents without deallocating.
    fn clear(&mut self);

    #[inline]
    fn history(&self, delay: usize) -> f32 {
        self.read_at(self.write_phase() as isize - delay as isize)
    }

    /// Four consecutive samples `[a, b, c, d]` where `b = history(delay)`,
    /// `a` is one sample newer and `c`, `d` are progressively older.
    #[inline]
    fn window(&self, delay: usize) -> [f32; 4] {
        [
            self.history(delay.saturating_sub(1)),
            self.history(delay),
            self.history(delay + 1),
            self.history(delay + 2),
        ]
    }
}

pub(crate) fn zeroed(len: usize) -> Result<Vec<f32>, DelayError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| DelayError::Allocation { requested: len })?;
    data.resize(len, 0.0);
    Ok(data)
}
