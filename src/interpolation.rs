use crate::buffer::SampleBuffer;

/// Smallest delay, in samples, accepted by interpolated reads. Below this the
/// four-point window would include samples that have not been written yet.
pub const MIN_INTERPOLATED_DELAY: f32 = 4.0;

/// Four-point cubic interpolation between `b` and `c`.
///
/// `a` is the newest sample, `d` the oldest; `frac == 0` yields `b` and
/// `frac == 1` yields `c`. The operation order is fixed so outputs stay
/// bit-compatible with existing renders.
#[inline(always)]
pub fn cubic_interpolate(a: f32, b: f32, c: f32, d: f32, frac: f32) -> f32 {
    let cminusb = c - b;
    b + frac
        * (cminusb
            - 0.1666667
                * (1.0 - frac)
                * ((d - a - 3.0 * cminusb) * frac + (d + 2.0 * a - 3.0 * b)))
}

/// Reads `position` samples back into the history of `buffer`.
///
/// `position` must already be clamped to
/// `[MIN_INTERPOLATED_DELAY, capacity - GUARD_SAMPLES]`; it is not checked here.
#[inline]
pub fn read_fractional<B: SampleBuffer + ?Sized>(buffer: &B, position: f32) -> f32 {
    let index = position as usize;
    let frac = position - index as f32;
    let [a, b, c, d] = buffer.window(index);
    cubic_interpolate(a, b, c, d, frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{GuardedBuffer, MaskedBuffer};

    fn sine_buffer(len: usize) -> GuardedBuffer {
        let mut buffer = GuardedBuffer::new();
        buffer.ensure_capacity(len, 0).unwrap();
        for i in 0..len * 3 {
            buffer.advance_write((i as f32 * 0.05).sin());
        }
        buffer
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(cubic_interpolate(0.3, -0.2, 0.7, 0.1, 0.0), -0.2);
        assert!((cubic_interpolate(0.3, -0.2, 0.7, 0.1, 1.0) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_linear_ramp_is_exact() {
        for step in 0..=10 {
            let frac = step as f32 / 10.0;
            let y = cubic_interpolate(0.0, 1.0, 2.0, 3.0, frac);
            assert!((y - (1.0 + frac)).abs() < 1e-6, "frac {frac}: {y}");
        }
    }

    #[test]
    fn test_integer_position_matches_history() {
        let buffer = sine_buffer(128);
        for delay in 4..100 {
            assert_eq!(read_fractional(&buffer, delay as f32), buffer.history(delay));
        }
    }

    #[test]
    fn test_continuity_across_integer_boundary() {
        let buffer = sine_buffer(256);

        // Largest first difference of the stored signal bounds any jump.
        let max_step = (1..200)
            .map(|k| (buffer.history(k) - buffer.history(k + 1)).abs())
            .fold(0.0f32, f32::max);

        for delay in 8..160 {
            let before = read_fractional(&buffer, delay as f32 - 0.001);
            let at = read_fractional(&buffer, delay as f32);
            assert!(
                (before - at).abs() <= max_step,
                "jump of {} at {delay}",
                (before - at).abs()
            );
        }
    }

    #[test]
    fn test_fine_sweep_has_no_discontinuity() {
        let buffer = sine_buffer(256);
        let mut previous = read_fractional(&buffer, 10.0);
        let mut position = 10.0f32;
        while position < 40.0 {
            position += 0.01;
            let sample = read_fractional(&buffer, position);
            // Signal slope is at most 0.05 per sample.
            assert!((sample - previous).abs() < 0.002, "at {position}");
            previous = sample;
        }
    }

    #[test]
    fn test_masked_and_guarded_reads_agree() {
        let mut guarded = GuardedBuffer::new();
        let mut masked = MaskedBuffer::with_capacity(128);
        guarded.ensure_capacity(100, 0).unwrap();
        for i in 0..333 {
            let sample = (i as f32 * 0.11).cos();
            guarded.advance_write(sample);
            masked.advance_write(sample);
        }
        for step in 0..200 {
            let position = 4.0 + step as f32 * 0.47;
            assert_eq!(
                read_fractional(&guarded, position),
                read_fractional(&masked, position)
            );
        }
    }
}
