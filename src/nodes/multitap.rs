use std::any::Any;

use rustc_hash::FxHashMap;

use crate::audio::AudioInput;
use crate::buffer::{sanitize, MaskedBuffer, SampleBuffer, GUARD_SAMPLES};
use crate::controller::{DelayRounding, DelayTimeController};
use crate::error::DelayError;
use crate::interpolation::MIN_INTERPOLATED_DELAY;
use crate::line::DelayLine;
use crate::params::{
    checked_feedback_tap, checked_tap_count, DelayParam, MixParameters, TapLayout,
};
use crate::traits::{DelayNode, PortId, PrepareContext};

/// Reads every tap of `layout` at multiples of `base_delay` samples.
///
/// Returns the level-weighted sum and the raw sample of the feedback tap.
#[inline]
pub(crate) fn mix_taps<B: SampleBuffer>(
    line: &DelayLine<B>,
    layout: &TapLayout,
    base_delay: f32,
    limit: f32,
) -> (f32, f32) {
    let mut wet = 0.0;
    let mut feedback = 0.0;
    for tap in layout.taps() {
        let position = (tap.delay_multiplier * base_delay)
            .min(limit)
            .max(MIN_INTERPOLATED_DELAY);
        let sample = line.read_interpolated(position);
        wet += tap.level * sample;
        if tap.is_feedback_source {
            feedback = sample;
        }
    }
    (wet, feedback)
}

/// Furthest a tap may reach back: the buffer minus one block, so a read never
/// overtakes the write pointer within the block.
pub(crate) fn tap_limit(capacity: usize, block: usize) -> Option<f32> {
    let limit = capacity.checked_sub(block)?;
    Some(limit.min(capacity.saturating_sub(GUARD_SAMPLES)) as f32)
}

/// Multi-tap delay with feedback on a power-of-two buffer.
///
/// Taps sit at 1, 2, .. N times the base delay, each at level 1/N. The base
/// delay comes from `DelayTimeMod` (milliseconds per sample) or, when that
/// port is unconnected, from the configured delay time.
pub struct MultiTapDelay {
    line: DelayLine<MaskedBuffer>,
    mix: MixParameters,
    tap_count: usize,
    feedback_tap: usize,
    layout: TapLayout,
    configured: bool,
    active: bool,
}

impl MultiTapDelay {
    pub fn new(max_delay_ms: f32, delay_ms: f32) -> Self {
        Self {
            line: DelayLine::new(
                MaskedBuffer::new(),
                DelayTimeController::new(max_delay_ms, delay_ms)
                    .with_rounding(DelayRounding::Fractional)
                    .with_min_delay(MIN_INTERPOLATED_DELAY),
            ),
            mix: MixParameters::new(),
            tap_count: 1,
            feedback_tap: 1,
            layout: TapLayout::new(),
            configured: false,
            active: true,
        }
    }

    pub fn mix(&self) -> &MixParameters {
        &self.mix
    }

    pub fn tap_count(&self) -> usize {
        self.tap_count
    }

    pub fn feedback_tap(&self) -> usize {
        self.feedback_tap
    }

    pub fn capacity(&self) -> usize {
        self.line.buffer().capacity()
    }

    fn set_tap_count(&mut self, requested: usize) -> Result<(), DelayError> {
        let (count, count_error) = match checked_tap_count(requested) {
            Ok(count) => (count, None),
            Err((count, err)) => (count, Some(err)),
        };
        self.tap_count = count;
        let feedback_error = match checked_feedback_tap(self.feedback_tap, count) {
            Ok(_) => None,
            Err((tap, err)) => {
                self.feedback_tap = tap;
                Some(err)
            }
        };
        match count_error.or(feedback_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_feedback_tap(&mut self, requested: usize) -> Result<(), DelayError> {
        match checked_feedback_tap(requested, self.tap_count) {
            Ok(tap) => {
                self.feedback_tap = tap;
                Ok(())
            }
            Err((tap, err)) => {
                self.feedback_tap = tap;
                Err(err)
            }
        }
    }
}

impl DelayNode for MultiTapDelay {
    fn get_ports(&self) -> FxHashMap<PortId, bool> {
        let mut ports = FxHashMap::default();
        ports.insert(PortId::AudioInput0, false);
        ports.insert(PortId::DelayTimeMod, false);
        ports.insert(PortId::AudioOutput0, true);
        ports
    }

    fn prepare(&mut self, ctx: &mut PrepareContext<'_>) {
        match self
            .line
            .controller_mut()
            .on_system_params_changed(ctx.block_size, ctx.sample_rate)
        {
            Ok(changed) if changed || !self.configured => {
                if let Err(err) = self.line.configure() {
                    ctx.report(self.node_type(), err);
                }
                self.configured = true;
            }
            Ok(_) => {}
            Err(err) => ctx.report(self.node_type(), err),
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

        if !self.configured || !self.line.has_safe_span() {
            output.fill(0.0);
            return;
        }

        let input = AudioInput::new(inputs.get(&PortId::AudioInput0).copied(), 0.0);
        let Some(limit) = tap_limit(self.line.buffer().capacity(), n) else {
            for i in 0..n {
                self.line.write(input.get(i));
            }
            output.fill(0.0);
            return;
        };

        let controller = self.line.controller();
        let samples_per_ms = controller.samples_per_ms();
        let delay_ms = AudioInput::new(
            inputs.get(&PortId::DelayTimeMod).copied(),
            controller.delay_ms(),
        );
        self.layout.regenerate(self.tap_count, self.feedback_tap);

        for (i, sample) in output.iter_mut().enumerate() {
            let dry = sanitize(input.get(i));
            let base_delay = samples_per_ms * delay_ms.get(i);
            let (wet, feedback) = mix_taps(&self.line, &self.layout, base_delay, limit);
            *sample = self.mix.blend(wet, dry);
            self.line.write(self.mix.feedback_write(dry, feedback));
        }
    }

    fn reset(&mut self) {
        self.line.clear();
    }

    fn apply_param(&mut self, param: DelayParam) -> Result<(), DelayError> {
        match param {
            DelayParam::WetDry(value) => self.mix.set_wet_dry(value),
            DelayParam::Feedback(value) => self.mix.set_feedback(value),
            DelayParam::TapCount(count) => self.set_tap_count(count),
            DelayParam::FeedbackTap(tap) => self.set_feedback_tap(tap),
            DelayParam::DelayMs(ms) => {
                self.line.controller_mut().set_delay_ms(ms);
                Ok(())
            }
            DelayParam::MaxDelayMs(ms) => {
                self.line.controller_mut().set_buffer_ms(ms);
                if self.configured {
                    self.line.configure()?;
                }
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
        "multitap"
    }
}
