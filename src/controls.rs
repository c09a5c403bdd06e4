//! Control-layer validation and display formatting. Everything handed to the
//! engine passes through here first, so the analysis core can assume sane
//! input.

use crate::dsp::delay::MAX_DELAY_SAMPLES;
use crate::dsp::gain::{MAX_GAIN_DB, MIN_GAIN_DB};
use crate::dsp::spectrogram::{MAX_FRAME_LENGTH, MIN_FRAME_LENGTH};

const BASE_EXPONENT: u32 = MIN_FRAME_LENGTH.trailing_zeros();
pub const MAX_RESOLUTION_STEP: u32 = MAX_FRAME_LENGTH.trailing_zeros() - BASE_EXPONENT;

/// Centre position of the delay slider; values below delay the left channel.
#[cfg_attr(not(test), allow(dead_code))]
pub const DELAY_CONTROL_CENTER: i32 = 4096;

pub const MIN_TOP_BIN: usize = 2;
pub const MAX_MULTIPLIER: f32 = 15.0;

/// Frame length selected by a stepped resolution control: `2^(7 + step)`.
pub fn frame_length_from_step(step: u32) -> usize {
    1 << (BASE_EXPONENT + step.min(MAX_RESOLUTION_STEP))
}

pub fn step_from_frame_length(frame_length: usize) -> u32 {
    sanitize_frame_length(frame_length).trailing_zeros() - BASE_EXPONENT
}

/// Clamp to the supported range and snap to the nearest power of two.
pub fn sanitize_frame_length(requested: usize) -> usize {
    let clamped = requested.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH);
    if clamped.is_power_of_two() {
        return clamped;
    }
    let upper = clamped.next_power_of_two();
    let lower = upper >> 1;
    if clamped - lower < upper - clamped {
        lower
    } else {
        upper.min(MAX_FRAME_LENGTH)
    }
}

/// Signed inter-channel offset for a delay slider position in
/// `[0, 2 * DELAY_CONTROL_CENTER]`.
#[cfg_attr(not(test), allow(dead_code))]
pub fn delay_offset_from_control(position: f32) -> i32 {
    let position = if position.is_finite() { position as i32 } else { DELAY_CONTROL_CENTER };
    position.clamp(0, 2 * DELAY_CONTROL_CENTER) - DELAY_CONTROL_CENTER
}

pub fn clamp_delay_offset(offset: i32) -> i32 {
    let limit = MAX_DELAY_SAMPLES as i32;
    offset.clamp(-limit, limit)
}

/// Displayed bin range; `top` is exclusive and never below `bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub bottom: usize,
    pub top: usize,
}

impl BinRange {
    /// The whole spectrum for `bin_count` bins.
    pub fn full(bin_count: usize) -> Self {
        Self {
            bottom: 0,
            top: bin_count,
        }
    }

    /// Move the top edge, keeping it in `[max(bottom, 2), bin_count]`.
    pub fn with_top(self, requested: usize, bin_count: usize) -> Self {
        let top = requested
            .max(self.bottom)
            .max(MIN_TOP_BIN)
            .min(bin_count);
        Self {
            bottom: self.bottom.min(top),
            top,
        }
    }

    /// Move the bottom edge, keeping it in `[0, top]`.
    pub fn with_bottom(self, requested: usize, bin_count: usize) -> Self {
        let top = self.top.min(bin_count);
        Self {
            bottom: requested.min(top),
            top,
        }
    }
}

pub fn clamp_gain_db(db: f32) -> f32 {
    if db.is_nan() { 0.0 } else { db.clamp(MIN_GAIN_DB, MAX_GAIN_DB) }
}

pub fn clamp_multiplier(value: f32) -> f32 {
    if value.is_nan() { 1.0 } else { value.clamp(0.0, MAX_MULTIPLIER) }
}

pub fn clamp_threshold(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// How a control renders its current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Two decimals followed by a unit.
    Plain(&'static str),
    Hertz,
    /// Value is a resolution step; shows the resulting frame length.
    FrameLength,
    /// Value is a signed offset; shows which channel is delayed.
    Delay,
}

impl ValueFormat {
    pub fn format(self, value: f32) -> String {
        match self {
            ValueFormat::Plain("") => format!("{value:.2}"),
            ValueFormat::Plain(unit) => format!("{value:.2} {unit}"),
            ValueFormat::Hertz => format!("{value:.3}Hz"),
            ValueFormat::FrameLength => {
                frame_length_from_step(value.max(0.0) as u32).to_string()
            }
            ValueFormat::Delay => {
                let offset = value as i32;
                match offset {
                    0 => "---".to_string(),
                    o if o < 0 => format!("L +{}", o.unsigned_abs()),
                    o => format!("R +{o}"),
                }
            }
        }
    }
}

/// User-facing controls and their labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    PreGain,
    Resolution,
    Delay,
    TopBin,
    BottomBin,
    Multiplier,
    Threshold,
}

impl Control {
    pub const ALL: [Control; 7] = [
        Control::PreGain,
        Control::Resolution,
        Control::Delay,
        Control::TopBin,
        Control::BottomBin,
        Control::Multiplier,
        Control::Threshold,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Control::PreGain => "Pre-gain",
            Control::Resolution => "Window size",
            Control::Delay => "Delay",
            Control::TopBin => "Top bin",
            Control::BottomBin => "Bottom bin",
            Control::Multiplier => "Multiplier",
            Control::Threshold => "Threshold",
        }
    }

    pub fn value_format(self) -> ValueFormat {
        match self {
            Control::PreGain => ValueFormat::Plain("dB"),
            Control::Resolution => ValueFormat::FrameLength,
            Control::Delay => ValueFormat::Delay,
            Control::TopBin | Control::BottomBin | Control::Multiplier | Control::Threshold => {
                ValueFormat::Plain("")
            }
        }
    }

    pub fn describe(self, value: f32) -> String {
        format!("{}: {}", self.label(), self.value_format().format(value))
    }
}
