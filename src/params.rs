use serde::{Deserialize, Serialize};

use crate::error::DelayError;

pub const MAX_TAPS: usize = 32;
pub const MAX_FEEDBACK: f32 = 0.99;

/// Wet/dry blend and feedback amount shared by the tap mixers.
///
/// Out-of-range values are replaced with 0 and reported.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MixParameters {
    wet_dry: f32,
    feedback: f32,
}

impl MixParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_wet_dry(&mut self, wet_dry: f32) -> Result<(), DelayError> {
        if (0.0..=1.0).contains(&wet_dry) {
            self.wet_dry = wet_dry;
            Ok(())
        } else {
            self.wet_dry = 0.0;
            Err(DelayError::WetDryOutOfRange(wet_dry))
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) -> Result<(), DelayError> {
        if (0.0..=MAX_FEEDBACK).contains(&feedback) {
            self.feedback = feedback;
            Ok(())
        } else {
            self.feedback = 0.0;
            Err(DelayError::FeedbackOutOfRange(feedback))
        }
    }

    pub fn wet_dry(&self) -> f32 {
        self.wet_dry
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    #[inline(always)]
    pub fn blend(&self, wet: f32, dry: f32) -> f32 {
        self.wet_dry * wet + (1.0 - self.wet_dry) * dry
    }

    /// Value written back into the line for one sample.
    #[inline(always)]
    pub fn feedback_write(&self, dry: f32, feedback_tap: f32) -> f32 {
        dry * (1.0 - self.feedback) + feedback_tap * self.feedback
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    /// 1-based position in the layout.
    pub index: usize,
    pub delay_multiplier: f32,
    pub level: f32,
    pub is_feedback_source: bool,
}

/// Tap descriptors for one block, rebuilt from the tap count and feedback tap.
#[derive(Debug, Clone)]
pub struct TapLayout {
    taps: Vec<Tap>,
}

impl TapLayout {
    pub fn new() -> Self {
        Self {
            taps: Vec::with_capacity(MAX_TAPS),
        }
    }

    pub fn uniform(count: usize, feedback_tap: usize) -> Self {
        let mut layout = Self::new();
        layout.regenerate(count, feedback_tap);
        layout
    }

    /// Taps at multiples of the base delay with equal levels summing to 1.
    pub fn regenerate(&mut self, count: usize, feedback_tap: usize) {
        let count = count.clamp(1, MAX_TAPS);
        let level = 1.0 / count as f32;
        self.taps.clear();
        self.taps.extend((1..=count).map(|index| Tap {
            index,
            delay_multiplier: index as f32,
            level,
            is_feedback_source: index == feedback_tap,
        }));
    }

    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }
}

impl Default for TapLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated tap count. Out-of-range counts are clamped into `1..=MAX_TAPS`.
pub fn checked_tap_count(requested: usize) -> Result<usize, (usize, DelayError)> {
    if (1..=MAX_TAPS).contains(&requested) {
        Ok(requested)
    } else {
        Err((
            requested.clamp(1, MAX_TAPS),
            DelayError::InvalidTapCount {
                requested,
                max: MAX_TAPS,
            },
        ))
    }
}

/// Validated feedback tap. Anything outside `1..=taps` falls back to tap 1.
pub fn checked_feedback_tap(requested: usize, taps: usize) -> Result<usize, (usize, DelayError)> {
    if (1..=taps).contains(&requested) {
        Ok(requested)
    } else {
        Err((1, DelayError::InvalidFeedbackTap { requested, taps }))
    }
}

/// User-facing parameter updates, applied between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "param", content = "value", rename_all = "snake_case")]
pub enum DelayParam {
    DelayMs(f32),
    MaxDelayMs(f32),
    WetDry(f32),
    Feedback(f32),
    TapCount(usize),
    FeedbackTap(usize),
    FeedbackTapRight(usize),
    RampMs(f32),
    Clear,
}

impl DelayParam {
    pub fn name(&self) -> &'static str {
        match self {
            DelayParam::DelayMs(_) => "delay_ms",
            DelayParam::MaxDelayMs(_) => "max_delay_ms",
            DelayParam::WetDry(_) => "wet_dry",
            DelayParam::Feedback(_) => "feedback",
            DelayParam::TapCount(_) => "tap_count",
            DelayParam::FeedbackTap(_) => "feedback_tap",
            DelayParam::FeedbackTapRight(_) => "feedback_tap_right",
            DelayParam::RampMs(_) => "ramp_ms",
            DelayParam::Clear => "clear",
        }
    }
}
