use log::debug;

use super::{sanitize, zeroed, SampleBuffer, CAPACITY_QUANTUM, GUARD_SAMPLES};
use crate::error::DelayError;

/// Linear buffer with a mirrored guard region.
///
/// Layout: `[guard (4) | logical samples (capacity)]`. Writes run over
/// `[GUARD_SAMPLES, capacity + GUARD_SAMPLES)`. When the write phase reaches
/// the end, the last four samples are copied to `[0, GUARD_SAMPLES)` and the
/// phase drops back by `capacity`, so index `i < GUARD_SAMPLES` always holds
/// the same sample as `i + capacity` did at the last wraparound.
#[derive(Debug, Clone)]
pub struct GuardedBuffer {
    data: Vec<f32>,
    capacity: usize,
    write_phase: usize,
}

impl GuardedBuffer {
    /// Creates a buffer holding a single guard width of samples.
    pub fn new() -> Self {
        Self {
            data: vec![0.0; GUARD_SAMPLES * 2],
            capacity: GUARD_SAMPLES,
            write_phase: GUARD_SAMPLES,
        }
    }

    /// Physical contents, guard region included.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline(always)]
    fn end(&self) -> usize {
        self.capacity + GUARD_SAMPLES
    }

    #[inline(always)]
    fn fold(&self, phase: isize) -> isize {
        let capacity = self.capacity as isize;
        if phase < 0 {
            phase + capacity
        } else if phase >= self.end() as isize {
            phase - capacity
        } else {
            phase
        }
    }
}

impl Default for GuardedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer for GuardedBuffer {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn write_phase(&self) -> usize {
        self.write_phase
    }

    fn ensure_capacity(
        &mut self,
        required_samples: usize,
        block_size: usize,
    ) -> Result<bool, DelayError> {
        let requested = required_samples
            .max(1)
            .checked_next_multiple_of(CAPACITY_QUANTUM)
            .and_then(|n| n.checked_add(block_size))
            .ok_or(DelayError::Allocation {
                requested: usize::MAX,
            })?;

        if requested <= self.capacity {
            return Ok(false);
        }

        let len = requested
            .checked_add(GUARD_SAMPLES)
            .ok_or(DelayError::Allocation { requested })?;
        self.data = zeroed(len)?;
        self.capacity = requested;
        self.write_phase = GUARD_SAMPLES;
        debug!("guarded delay buffer grown to {} samples", requested);
        Ok(true)
    }

    #[inline]
    fn advance_write(&mut self, sample: f32) {
        let end = self.end();
        self.data[self.write_phase] = sanitize(sample);
        self.write_phase += 1;
        if self.write_phase == end {
            self.data.copy_within(self.capacity..end, 0);
            self.write_phase = GUARD_SAMPLES;
        }
    }

    #[inline]
    fn read_at(&self, phase: isize) -> f32 {
        let phase = self.fold(phase);
        usize::try_from(phase)
            .ok()
            .and_then(|index| self.data.get(index))
            .copied()
            .unwrap_or(0.0)
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Reads the four samples as one slice. The top index is folded into
    /// `[GUARD_SAMPLES, end)`, so the three older samples land in the
    /// mirrored guard region at worst.
    #[inline]
    fn window(&self, delay: usize) -> [f32; 4] {
        let mut top = self.write_phase as isize - delay as isize + 1;
        if top < GUARD_SAMPLES as isize {
            top += self.capacity as isize;
        }
        let window = usize::try_from(top).ok().and_then(|top| {
            top.checked_sub(3)
                .and_then(|low| self.data.get(low..=top))
        });
        match window {
            Some(&[d, c, b, a]) => [a, b, c, d],
            _ => [0.0; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_one_guard_wide() {
        let buffer = GuardedBuffer::new();
        assert_eq!(buffer.capacity(), GUARD_SAMPLES);
        assert_eq!(buffer.write_phase(), GUARD_SAMPLES);
        assert_eq!(buffer.as_slice().len(), GUARD_SAMPLES * 2);
        assert!(buffer.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_capacity_rounds_to_quantum_plus_block() {
        let mut buffer = GuardedBuffer::new();
        assert_eq!(buffer.ensure_capacity(441, 64), Ok(true));
        // 441 rounds up to 444, plus one block of headroom.
        assert_eq!(buffer.capacity(), 444 + 64);
        assert_eq!(buffer.as_slice().len(), 444 + 64 + GUARD_SAMPLES);
    }

    #[test]
    fn test_ensure_capacity_is_idempotent() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(100, 16).unwrap();
        for i in 0..37 {
            buffer.advance_write(i as f32 + 1.0);
        }
        let phase = buffer.write_phase();

        assert_eq!(buffer.ensure_capacity(100, 16), Ok(false));
        assert_eq!(buffer.write_phase(), phase);
        assert_eq!(buffer.history(1), 37.0);

        // Smaller requests never shrink.
        assert_eq!(buffer.ensure_capacity(8, 0), Ok(false));
        assert_eq!(buffer.capacity(), 116);
    }

    #[test]
    fn test_growth_resets_phase_and_history() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(16, 0).unwrap();
        for _ in 0..10 {
            buffer.advance_write(1.0);
        }
        assert_eq!(buffer.ensure_capacity(64, 0), Ok(true));
        assert_eq!(buffer.write_phase(), GUARD_SAMPLES);
        assert!(buffer.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_failed_growth_keeps_previous_buffer() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(32, 0).unwrap();
        buffer.advance_write(0.5);

        assert!(buffer.ensure_capacity(usize::MAX / 8, 0).is_err());
        assert!(buffer.ensure_capacity(usize::MAX, 64).is_err());
        assert_eq!(buffer.capacity(), 32);
        assert_eq!(buffer.history(1), 0.5);
    }

    #[test]
    fn test_wraparound_mirrors_tail_into_guard() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(8, 0).unwrap();
        let capacity = buffer.capacity();

        for i in 0..capacity {
            buffer.advance_write(i as f32 + 1.0);
        }

        assert_eq!(buffer.write_phase(), GUARD_SAMPLES);
        let data = buffer.as_slice();
        assert_eq!(&data[..GUARD_SAMPLES], &data[capacity..capacity + GUARD_SAMPLES]);
        assert_eq!(&data[..GUARD_SAMPLES], &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_history_across_wraparound() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(12, 0).unwrap();

        for i in 1..=30 {
            buffer.advance_write(i as f32);
        }

        for delay in 1..=buffer.capacity() {
            assert_eq!(buffer.history(delay), (31 - delay) as f32, "delay {delay}");
        }
    }

    #[test]
    fn test_window_spans_guard_region() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(8, 0).unwrap();

        // Stop right after a wrap so the window has to reach into the guard.
        for i in 1..=(buffer.capacity() + 1) {
            buffer.advance_write(i as f32);
        }

        assert_eq!(buffer.window(2), [9.0, 8.0, 7.0, 6.0]);
        assert_eq!(buffer.window(4), [7.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn test_non_finite_input_is_stored_as_zero() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(8, 0).unwrap();
        buffer.advance_write(f32::NAN);
        buffer.advance_write(f32::INFINITY);
        buffer.advance_write(1.0e-40);
        assert_eq!(buffer.window(2), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(20, 4).unwrap();
        for _ in 0..7 {
            buffer.advance_write(0.9);
        }
        buffer.clear();
        assert_eq!(buffer.capacity(), 24);
        assert!(buffer.as_slice().iter().all(|&s| s == 0.0));
    }
}
