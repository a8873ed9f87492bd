use crate::error::DelayError;

/// How announced block sizes and sample rates are adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemParamsPolicy {
    /// Always take the announced values.
    #[default]
    Track,
    /// Only ever raise the cached block size and sample rate.
    RaiseOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayRounding {
    /// Round half up to a whole number of samples.
    #[default]
    Nearest,
    /// Keep the fractional part for interpolated reads.
    Fractional,
}

/// Linear cross-fade between two read positions.
///
/// Weights are kept in `f64` so long ramps do not drift away from a sum of 1.
#[derive(Debug, Clone, Default)]
pub struct DelayRamp {
    remaining: usize,
    increment: f64,
    current: f64,
    previous: f64,
    previous_delay: f32,
}

impl DelayRamp {
    pub fn start(&mut self, from_delay: f32, ramp_samples: usize) {
        if ramp_samples == 0 {
            self.finish();
            return;
        }
        self.remaining = ramp_samples;
        self.increment = 1.0 / ramp_samples as f64;
        self.current = 0.0;
        self.previous = 1.0;
        self.previous_delay = from_delay;
    }

    pub fn finish(&mut self) {
        self.remaining = 0;
        self.current = 1.0;
        self.previous = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Read position the ramp is fading away from.
    pub fn previous_delay(&self) -> f32 {
        self.previous_delay
    }

    /// Returns `(target, previous)` weights for the next sample and steps the
    /// ramp. Once the last step is taken the weights pin to `(1, 0)`.
    #[inline]
    pub fn next_weights(&mut self) -> (f32, f32) {
        if self.remaining == 0 {
            return (1.0, 0.0);
        }
        let weights = (self.current as f32, self.previous as f32);
        self.current += self.increment;
        self.previous -= self.increment;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.current = 1.0;
            self.previous = 0.0;
        }
        weights
    }
}

/// Converts delay times in milliseconds into read positions for the current
/// sample rate and block size.
#[derive(Debug, Clone)]
pub struct DelayTimeController {
    sample_rate: f32,
    samples_per_ms: f32,
    block_size: usize,
    policy: SystemParamsPolicy,
    rounding: DelayRounding,
    block_bias: bool,
    buffer_ms: f32,
    delay_ms: f32,
    ramp_ms: f32,
    min_delay: f32,
    max_delay: f32,
    delay_samples: f32,
    configured: bool,
    ramp: DelayRamp,
}

impl DelayTimeController {
    pub fn new(buffer_ms: f32, delay_ms: f32) -> Self {
        Self {
            sample_rate: 0.0,
            samples_per_ms: 0.0,
            block_size: 0,
            policy: SystemParamsPolicy::Track,
            rounding: DelayRounding::Nearest,
            block_bias: false,
            buffer_ms: finite_or_zero(buffer_ms).max(0.0),
            delay_ms: finite_or_zero(delay_ms),
            ramp_ms: 0.0,
            min_delay: 0.0,
            max_delay: f32::MAX,
            delay_samples: 0.0,
            configured: false,
            ramp: DelayRamp::default(),
        }
    }

    pub fn with_policy(mut self, policy: SystemParamsPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: SystemParamsPolicy) {
        self.policy = policy;
    }

    pub fn with_rounding(mut self, rounding: DelayRounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Pushes the read position one block further back.
    pub fn with_block_bias(mut self, block_bias: bool) -> Self {
        self.block_bias = block_bias;
        self
    }

    pub fn with_min_delay(mut self, min_delay: f32) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Applies a host announcement. Returns `Ok(true)` when the cached values
    /// changed and the buffer capacity has to be re-derived.
    pub fn on_system_params_changed(
        &mut self,
        block_size: usize,
        sample_rate: f32,
    ) -> Result<bool, DelayError> {
        if block_size == 0 || !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(DelayError::InvalidSystemParams {
                block_size,
                sample_rate,
            });
        }

        let (block_size, sample_rate) = match self.policy {
            SystemParamsPolicy::Track => (block_size, sample_rate),
            SystemParamsPolicy::RaiseOnly if self.configured => (
                block_size.max(self.block_size),
                sample_rate.max(self.sample_rate),
            ),
            SystemParamsPolicy::RaiseOnly => (block_size, sample_rate),
        };

        let changed = !self.configured
            || block_size != self.block_size
            || sample_rate != self.sample_rate;

        self.block_size = block_size;
        self.sample_rate = sample_rate;
        self.samples_per_ms = sample_rate * 0.001;
        self.configured = true;
        if changed {
            self.ramp.finish();
            self.delay_samples = self.compute_delay_samples(self.delay_ms);
        }
        Ok(changed)
    }

    /// Sets the target delay. While configured and with a ramp length set,
    /// the read position cross-fades from the old target to the new one.
    pub fn set_delay_ms(&mut self, delay_ms: f32) {
        self.delay_ms = finite_or_zero(delay_ms);
        if !self.configured {
            return;
        }
        let target = self.compute_delay_samples(self.delay_ms);
        if target != self.delay_samples {
            let ramp_samples = self.ramp_samples();
            if ramp_samples > 0 {
                self.ramp.start(self.delay_samples, ramp_samples);
            }
        }
        self.delay_samples = target;
    }

    pub fn set_buffer_ms(&mut self, buffer_ms: f32) {
        self.buffer_ms = finite_or_zero(buffer_ms).max(0.0);
    }

    /// Negative lengths disable ramping.
    pub fn set_ramp_ms(&mut self, ramp_ms: f32) {
        self.ramp_ms = finite_or_zero(ramp_ms).max(0.0);
    }

    /// Bounds the read position, usually to what the buffer can serve.
    pub fn set_limits(&mut self, min_delay: f32, max_delay: f32) {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        if self.configured {
            self.delay_samples = self.compute_delay_samples(self.delay_ms);
        }
    }

    /// Buffer samples needed to hold `buffer_ms`, never less than one.
    pub fn required_samples(&self) -> usize {
        ((self.buffer_ms * self.samples_per_ms) as usize).max(1)
    }

    /// Converts milliseconds to a clamped read position using the current
    /// rounding and bias.
    pub fn compute_delay_samples(&self, delay_ms: f32) -> f32 {
        let raw = (delay_ms * self.samples_per_ms).max(0.0);
        let rounded = match self.rounding {
            DelayRounding::Nearest => (raw + 0.5).trunc(),
            DelayRounding::Fractional => raw,
        };
        let biased = if self.block_bias {
            rounded + self.block_size as f32
        } else {
            rounded
        };
        biased.min(self.max_delay).max(self.min_delay)
    }

    fn ramp_samples(&self) -> usize {
        (self.ramp_ms as f64 * self.sample_rate as f64 * 0.001).round() as usize
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn samples_per_ms(&self) -> f32 {
        self.samples_per_ms
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn buffer_ms(&self) -> f32 {
        self.buffer_ms
    }

    pub fn delay_ms(&self) -> f32 {
        self.delay_ms
    }

    pub fn ramp_ms(&self) -> f32 {
        self.ramp_ms
    }

    pub fn delay_samples(&self) -> f32 {
        self.delay_samples
    }

    pub fn min_delay(&self) -> f32 {
        self.min_delay
    }

    pub fn max_delay(&self) -> f32 {
        self.max_delay
    }

    pub fn ramp(&self) -> &DelayRamp {
        &self.ramp
    }

    pub fn ramp_mut(&mut self) -> &mut DelayRamp {
        &mut self.ramp
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_system_params() {
        let mut controller = DelayTimeController::new(100.0, 10.0);
        assert!(controller.on_system_params_changed(0, 44100.0).is_err());
        assert!(controller.on_system_params_changed(64, 0.0).is_err());
        assert!(controller.on_system_params_changed(64, f32::NAN).is_err());
        assert!(!controller.is_configured());
    }

    #[test]
    fn test_delay_conversion_rounds_half_up() {
        let mut controller = DelayTimeController::new(1000.0, 10.0);
        controller.on_system_params_changed(64, 44100.0).unwrap();
        assert_eq!(controller.delay_samples(), 441.0);
        assert_eq!(controller.required_samples(), 44100);

        controller.set_delay_ms(0.0125);
        // 0.55125 samples rounds to 1.
        assert_eq!(controller.delay_samples(), 1.0);
    }

    #[test]
    fn test_fractional_rounding_and_block_bias() {
        let mut controller = DelayTimeController::new(100.0, 1.5)
            .with_rounding(DelayRounding::Fractional)
            .with_block_bias(true);
        controller.on_system_params_changed(16, 1000.0).unwrap();
        assert_eq!(controller.delay_samples(), 17.5);
    }

    #[test]
    fn test_clamps_to_limits() {
        let mut controller = DelayTimeController::new(100.0, 500.0).with_min_delay(4.0);
        controller.on_system_params_changed(64, 1000.0).unwrap();
        controller.set_limits(4.0, 96.0);
        assert_eq!(controller.delay_samples(), 96.0);

        controller.set_delay_ms(1.0);
        assert_eq!(controller.delay_samples(), 4.0);
        controller.set_delay_ms(-20.0);
        assert_eq!(controller.delay_samples(), 4.0);
    }

    #[test]
    fn test_system_params_are_idempotent() {
        let mut controller = DelayTimeController::new(100.0, 10.0);
        assert_eq!(controller.on_system_params_changed(64, 48000.0), Ok(true));
        assert_eq!(controller.on_system_params_changed(64, 48000.0), Ok(false));
        assert_eq!(controller.on_system_params_changed(128, 48000.0), Ok(true));
        assert_eq!(controller.block_size(), 128);
        assert_eq!(controller.on_system_params_changed(32, 48000.0), Ok(true));
        assert_eq!(controller.block_size(), 32);
    }

    #[test]
    fn test_raise_only_policy_never_lowers() {
        let mut controller =
            DelayTimeController::new(100.0, 10.0).with_policy(SystemParamsPolicy::RaiseOnly);
        controller.on_system_params_changed(64, 48000.0).unwrap();
        assert_eq!(controller.on_system_params_changed(32, 44100.0), Ok(false));
        assert_eq!(controller.block_size(), 64);
        assert_eq!(controller.sample_rate(), 48000.0);
        assert_eq!(controller.on_system_params_changed(128, 44100.0), Ok(true));
        assert_eq!(controller.block_size(), 128);
        assert_eq!(controller.sample_rate(), 48000.0);
    }

    #[test]
    fn test_ramp_weights_sum_to_one_and_pin() {
        let mut ramp = DelayRamp::default();
        ramp.start(10.0, 8);
        let mut last_target = -1.0;
        for _ in 0..8 {
            let (target, previous) = ramp.next_weights();
            assert!((target + previous - 1.0).abs() < 1e-6);
            assert!(target > last_target);
            last_target = target;
        }
        assert!(!ramp.is_active());
        assert_eq!(ramp.next_weights(), (1.0, 0.0));
        assert_eq!(ramp.next_weights(), (1.0, 0.0));
    }

    #[test]
    fn test_delay_change_starts_ramp() {
        let mut controller = DelayTimeController::new(100.0, 10.0);
        controller.set_ramp_ms(5.0);
        controller.on_system_params_changed(16, 1000.0).unwrap();
        assert!(!controller.ramp().is_active());

        controller.set_delay_ms(20.0);
        assert!(controller.ramp().is_active());
        assert_eq!(controller.ramp().remaining(), 5);
        assert_eq!(controller.ramp().previous_delay(), 10.0);
        assert_eq!(controller.delay_samples(), 20.0);

        // A new target mid-ramp fades from the latest target.
        controller.ramp_mut().next_weights();
        controller.set_delay_ms(30.0);
        assert_eq!(controller.ramp().previous_delay(), 20.0);
        assert_eq!(controller.ramp().remaining(), 5);
    }

    #[test]
    fn test_negative_ramp_disables_ramping() {
        let mut controller = DelayTimeController::new(100.0, 10.0);
        controller.set_ramp_ms(-3.0);
        assert_eq!(controller.ramp_ms(), 0.0);
        controller.on_system_params_changed(16, 1000.0).unwrap();
        controller.set_delay_ms(40.0);
        assert!(!controller.ramp().is_active());
    }
}
