//! Pixel to history lookups for on-demand readouts.

use crate::dsp::spectrogram::{ColumnHistory, SpectralColumn};
use crate::render::{RasterLayout, RasterStyle};
use crate::util::audio::bin_frequency;
use std::fmt;

/// History index shown at pixel column `x`.
///
/// With a full viewport the rightmost slot is the newest column. A history
/// shorter than the viewport is right-aligned and every slot left of it maps to
/// the oldest column. Returns `None` for an empty history.
pub fn column_at_x(x: f32, layout: &RasterLayout, history_len: usize) -> Option<usize> {
    if history_len == 0 {
        return None;
    }
    let visible = layout.visible_columns();
    let slot = (x.max(0.0) as usize / layout.column_width.max(1)).min(visible.saturating_sub(1));
    let index = if history_len < visible {
        slot.saturating_sub(visible - history_len)
    } else {
        history_len - visible + slot
    };
    Some(index.min(history_len - 1))
}

/// Bin under pixel row `y` (0 = top), clamped to `bin_count - 1`.
pub fn bin_at_y(y: f32, layout: &RasterLayout, style: &RasterStyle, bin_count: usize) -> usize {
    let height = layout.height.max(1) as f32;
    let span = style.top_bin.saturating_sub(style.bottom_bin) as f32;
    let from_bottom = (height - y.clamp(0.0, height)).max(0.0);
    let bin = style.bottom_bin + (from_bottom * span / height).floor() as usize;
    bin.min(bin_count.saturating_sub(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelReadout {
    pub peak_frequency: f32,
    pub peak_magnitude: f32,
    pub magnitude: f32,
    pub phase: f32,
}

impl ChannelReadout {
    fn from_column(column: &SpectralColumn, bin: usize) -> Self {
        Self {
            peak_frequency: column.peak_frequency,
            peak_magnitude: column.peak_magnitude,
            magnitude: column.magnitudes.get(bin).copied().unwrap_or(0.0),
            phase: column.phases.get(bin).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorReadout {
    /// Viewport slot under the pointer.
    pub slot: usize,
    pub column: usize,
    pub bin: usize,
    pub frequency: f32,
    /// Frequency of the reference line, when one is placed.
    pub reference_frequency: Option<f32>,
    pub left: ChannelReadout,
    pub right: ChannelReadout,
}

/// Inputs shared by every cursor query against one engine state.
#[derive(Debug, Clone, Copy)]
pub struct CursorContext<'a> {
    pub layout: &'a RasterLayout,
    pub style: &'a RasterStyle,
    pub sample_rate: f32,
    pub frame_length: usize,
    pub reference_bin: Option<usize>,
}

impl CursorContext<'_> {
    pub fn readout(
        &self,
        x: f32,
        y: f32,
        left: &ColumnHistory,
        right: &ColumnHistory,
    ) -> Option<CursorReadout> {
        let column = column_at_x(x, self.layout, left.len().min(right.len()))?;
        let (l, r) = (left.get(column)?, right.get(column)?);
        let bin = bin_at_y(y, self.layout, self.style, l.len().min(r.len()));

        Some(CursorReadout {
            slot: x.max(0.0) as usize / self.layout.column_width.max(1),
            column,
            bin,
            frequency: bin_frequency(bin, self.sample_rate, self.frame_length),
            reference_frequency: self
                .reference_bin
                .map(|bin| bin_frequency(bin, self.sample_rate, self.frame_length)),
            left: ChannelReadout::from_column(l, bin),
            right: ChannelReadout::from_column(r, bin),
        })
    }
}

impl fmt::Display for CursorReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reference_frequency {
            Some(hz) => writeln!(f, "Cursor: {hz:.3}Hz")?,
            None => writeln!(f, "Cursor: ---")?,
        }
        writeln!(f, "col: {} bin: {}", self.slot, self.bin)?;
        writeln!(f, "Frequency: {:.3}Hz", self.frequency)?;
        for (label, channel) in [("LEFT", &self.left), ("RIGHT", &self.right)] {
            writeln!(f, "{label}")?;
            writeln!(f, "  peak: {:.3}Hz", channel.peak_frequency)?;
            writeln!(f, "  mag: {:.3}", channel.magnitude)?;
            writeln!(f, "  phase: {:.3}", channel.phase)?;
        }
        Ok(())
    }
}
