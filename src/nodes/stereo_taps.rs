use std::any::Any;

use rustc_hash::FxHashMap;

use super::multitap::{mix_taps, tap_limit};
use crate::audio::AudioInput;
use crate::buffer::{sanitize, MaskedBuffer, SampleBuffer};
use crate::controller::{DelayRounding, DelayTimeController};
use crate::error::DelayError;
use crate::interpolation::MIN_INTERPOLATED_DELAY;
use crate::line::DelayLine;
use crate::params::{
    checked_feedback_tap, checked_tap_count, DelayParam, MixParameters, TapLayout,
};
use crate::traits::{DelayNode, PortId, PrepareContext};

/// One side of the stereo mixer.
struct Channel {
    line: DelayLine<MaskedBuffer>,
    feedback_tap: usize,
    layout: TapLayout,
}

impl Channel {
    fn new(max_delay_ms: f32, delay_ms: f32, feedback_tap: usize) -> Self {
        Self {
            line: DelayLine::new(
                MaskedBuffer::new(),
                DelayTimeController::new(max_delay_ms, delay_ms)
                    .with_rounding(DelayRounding::Fractional)
                    .with_min_delay(MIN_INTERPOLATED_DELAY),
            ),
            feedback_tap,
            layout: TapLayout::new(),
        }
    }
}

/// Multi-tap delay fed by a mono input and mixed into two outputs.
///
/// Both sides share tap count, delay time and mix settings but feed back from
/// their own tap, which spreads the echoes across the stereo field.
pub struct StereoTapDelay {
    left: Channel,
    right: Channel,
    mix: MixParameters,
    tap_count: usize,
    configured: bool,
    active: bool,
}

impl StereoTapDelay {
    pub const DEFAULT_TAPS: usize = 4;
    pub const DEFAULT_FEEDBACK_LEFT: usize = 3;
    pub const DEFAULT_FEEDBACK_RIGHT: usize = 4;

    pub fn new(max_delay_ms: f32, delay_ms: f32) -> Self {
        Self {
            left: Channel::new(max_delay_ms, delay_ms, Self::DEFAULT_FEEDBACK_LEFT),
            right: Channel::new(max_delay_ms, delay_ms, Self::DEFAULT_FEEDBACK_RIGHT),
            mix: MixParameters::new(),
            tap_count: Self::DEFAULT_TAPS,
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

    pub fn feedback_taps(&self) -> (usize, usize) {
        (self.left.feedback_tap, self.right.feedback_tap)
    }

    pub fn capacity(&self) -> usize {
        self.left
            .line
            .buffer()
            .capacity()
            .min(self.right.line.buffer().capacity())
    }

    fn channels_mut(&mut self) -> [&mut Channel; 2] {
        [&mut self.left, &mut self.right]
    }

    fn set_feedback_tap(channel: &mut Channel, requested: usize, taps: usize) -> Result<(), DelayError> {
        match checked_feedback_tap(requested, taps) {
            Ok(tap) => {
                channel.feedback_tap = tap;
                Ok(())
            }
            Err((tap, err)) => {
                channel.feedback_tap = tap;
                Err(err)
            }
        }
    }

    fn set_tap_count(&mut self, requested: usize) -> Result<(), DelayError> {
        let (count, mut first_error) = match checked_tap_count(requested) {
            Ok(count) => (count, None),
            Err((count, err)) => (count, Some(err)),
        };
        self.tap_count = count;
        for channel in self.channels_mut() {
            if (1..=count).contains(&channel.feedback_tap) {
                continue;
            }
            let requested = channel.feedback_tap;
            if let Err(err) = Self::set_feedback_tap(channel, requested, count) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn configure(&mut self) -> Result<(), DelayError> {
        let left = self.left.line.configure();
        let right = self.right.line.configure();
        left.and(right).map(|_| ())
    }
}

impl DelayNode for StereoTapDelay {
    fn get_ports(&self) -> FxHashMap<PortId, bool> {
        let mut ports = FxHashMap::default();
        ports.insert(PortId::AudioInput0, false);
        ports.insert(PortId::DelayTimeMod, false);
        ports.insert(PortId::AudioOutput0, true);
        ports.insert(PortId::AudioOutput1, true);
        ports
    }

    fn prepare(&mut self, ctx: &mut PrepareContext<'_>) {
        let mut changed = !self.configured;
        for channel in self.channels_mut() {
            match channel
                .line
                .controller_mut()
                .on_system_params_changed(ctx.block_size, ctx.sample_rate)
            {
                Ok(c) => changed |= c,
                Err(err) => {
                    ctx.report("stereo_taps", err);
                    return;
                }
            }
        }
        if changed {
            if let Err(err) = self.configure() {
                ctx.report(self.node_type(), err);
            }
            self.configured = true;
        }
    }

    fn process(
        &mut self,
        inputs: &FxHashMap<PortId, &[f32]>,
        outputs: &mut FxHashMap<PortId, &mut [f32]>,
        buffer_size: usize,
    ) {
        let Some(out_left) = outputs.remove(&PortId::AudioOutput0) else {
            return;
        };
        let Some(out_right) = outputs.remove(&PortId::AudioOutput1) else {
            out_left.fill(0.0);
            return;
        };
        let n = buffer_size.min(out_left.len()).min(out_right.len());
        let (out_left, out_right) = (&mut out_left[..n], &mut out_right[..n]);

        if !self.configured || !self.left.line.has_safe_span() || !self.right.line.has_safe_span()
        {
            out_left.fill(0.0);
            out_right.fill(0.0);
            return;
        }

        let input = AudioInput::new(inputs.get(&PortId::AudioInput0).copied(), 0.0);
        let Some(limit) = tap_limit(self.capacity(), n) else {
            for i in 0..n {
                let half = 0.5 * sanitize(input.get(i));
                self.left.line.write(half);
                self.right.line.write(half);
            }
            out_left.fill(0.0);
            out_right.fill(0.0);
            return;
        };

        let controller = self.left.line.controller();
        let samples_per_ms = controller.samples_per_ms();
        let delay_ms = AudioInput::new(
            inputs.get(&PortId::DelayTimeMod).copied(),
            controller.delay_ms(),
        );
        let tap_count = self.tap_count;
        for channel in self.channels_mut() {
            channel.layout.regenerate(tap_count, channel.feedback_tap);
        }

        for i in 0..n {
            let dry = sanitize(input.get(i));
            let base_delay = samples_per_ms * delay_ms.get(i);

            let (wet, feedback) = mix_taps(&self.left.line, &self.left.layout, base_delay, limit);
            out_left[i] = self.mix.blend(wet, dry);
            self.left.line.write(self.mix.feedback_write(dry, feedback));

            let (wet, feedback) = mix_taps(&self.right.line, &self.right.layout, base_delay, limit);
            out_right[i] = self.mix.blend(wet, dry);
            self.right.line.write(self.mix.feedback_write(dry, feedback));
        }
    }

    fn reset(&mut self) {
        for channel in self.channels_mut() {
            channel.line.clear();
        }
    }

    fn apply_param(&mut self, param: DelayParam) -> Result<(), DelayError> {
        match param {
            DelayParam::WetDry(value) => self.mix.set_wet_dry(value),
            DelayParam::Feedback(value) => self.mix.set_feedback(value),
            DelayParam::TapCount(count) => self.set_tap_count(count),
            DelayParam::FeedbackTap(tap) => {
                Self::set_feedback_tap(&mut self.left, tap, self.tap_count)
            }
            DelayParam::FeedbackTapRight(tap) => {
                Self::set_feedback_tap(&mut self.right, tap, self.tap_count)
            }
            DelayParam::DelayMs(ms) => {
                for channel in self.channels_mut() {
                    channel.line.controller_mut().set_delay_ms(ms);
                }
                Ok(())
            }
            DelayParam::MaxDelayMs(ms) => {
                for channel in self.channels_mut() {
                    channel.line.controller_mut().set_buffer_ms(ms);
                }
                if self.configured {
                    self.configure()?;
                }
                Ok(())
            }
            DelayParam::Clear => {
                self.reset();
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
        "stereo_taps"
    }
}
