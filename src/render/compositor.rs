//! Column compositor: turns left/right spectral columns into pixel columns.
//!
//! Pixel row `y` counted from the bottom samples the fractional bin
//! `bottom + y * (top - bottom) / height`. The sampled magnitude is compared
//! against the threshold, scaled by the multiplier, clamped to `[0, 1]` and
//! mapped through the active palette. Both channels land in one composite
//! grid according to the [`ChannelBlend`] policy.

use super::palette::{Colormap, Palette};
use super::raster::{RasterGrid, Rgba};
use crate::dsp::spectrogram::{ColumnHistory, DEFAULT_FRAME_LENGTH, SpectralColumn, interpolate};
use serde::{Deserialize, Serialize};

/// Base colours used by the additive blend.
pub const LEFT_BASE: Rgba = Rgba::opaque(255, 64, 128);
pub const RIGHT_BASE: Rgba = Rgba::opaque(0, 191, 128);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelBlend {
    /// Per row, paint whichever channel is louder through the palette.
    #[default]
    MaxHold,
    /// Tint each channel with its base colour and sum with saturation.
    Additive,
    Left,
    Right,
}

impl ChannelBlend {
    /// Blend implied by a colour map: the two-tone map is additive, the
    /// perceptual maps use max-hold.
    pub fn for_colormap(colormap: Colormap) -> Self {
        match colormap {
            Colormap::GreenPink => ChannelBlend::Additive,
            _ => ChannelBlend::MaxHold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStyle {
    /// First bin mapped to the bottom row.
    pub bottom_bin: usize,
    /// Exclusive upper end of the displayed bin range.
    pub top_bin: usize,
    pub multiplier: f32,
    /// Raw magnitudes below this paint the floor colour.
    pub threshold: f32,
    pub colormap: Colormap,
    pub blend: ChannelBlend,
    pub peak_only: bool,
    pub floor: Rgba,
}

impl Default for RasterStyle {
    fn default() -> Self {
        Self {
            bottom_bin: 0,
            top_bin: DEFAULT_FRAME_LENGTH / 2 + 1,
            multiplier: 1.0,
            threshold: 0.0,
            colormap: Colormap::default(),
            blend: ChannelBlend::default(),
            peak_only: false,
            floor: Rgba::BLACK,
        }
    }
}

impl RasterStyle {
    /// Fractional bin sampled by row `row` (0 = bottom) of a raster `height`
    /// pixels tall.
    #[inline]
    pub fn bin_position(&self, row: usize, height: usize) -> f32 {
        let span = self.top_bin.saturating_sub(self.bottom_bin) as f32;
        self.bottom_bin as f32 + row as f32 * span / height.max(1) as f32
    }
}

#[derive(Debug)]
pub struct Compositor {
    style: RasterStyle,
    palette: &'static Palette,
    scratch: Vec<Rgba>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(RasterStyle::default())
    }
}

impl Compositor {
    pub fn new(style: RasterStyle) -> Self {
        Self {
            palette: style.colormap.palette(),
            style,
            scratch: Vec::new(),
        }
    }

    pub fn style(&self) -> RasterStyle {
        self.style
    }

    pub fn set_style(&mut self, style: RasterStyle) {
        self.palette = style.colormap.palette();
        self.style = style;
    }

    /// Scroll the grid by `produced` columns and paint the newest `produced`
    /// history entries at the right edge.
    pub fn append(
        &mut self,
        grid: &mut RasterGrid,
        left: &ColumnHistory,
        right: &ColumnHistory,
        produced: usize,
    ) {
        let produced = produced.min(left.len()).min(right.len());
        if produced == 0 {
            return;
        }
        let visible = grid.layout().visible_columns();
        let painted = produced.min(visible);
        grid.scroll_left(painted, self.style.floor);

        for offset in 0..painted {
            let age = painted - offset;
            let (Some(l), Some(r)) = (
                left.get(left.len() - age),
                right.get(right.len() - age),
            ) else {
                continue;
            };
            self.paint(grid, visible - age, l, r);
        }
    }

    /// Recompute the whole raster from history. When the history is shorter
    /// than the viewport, columns are right-aligned over the floor colour.
    pub fn repaint(&mut self, grid: &mut RasterGrid, left: &ColumnHistory, right: &ColumnHistory) {
        grid.fill(self.style.floor);
        let visible = grid.layout().visible_columns();
        let count = left.len().min(right.len()).min(visible);

        for offset in 0..count {
            let age = count - offset;
            let (Some(l), Some(r)) = (
                left.get(left.len() - age),
                right.get(right.len() - age),
            ) else {
                continue;
            };
            self.paint(grid, visible - age, l, r);
        }
    }

    fn paint(&mut self, grid: &mut RasterGrid, slot: usize, left: &SpectralColumn, right: &SpectralColumn) {
        let mut pixels = std::mem::take(&mut self.scratch);
        pixels.clear();
        pixels.resize(grid.height(), self.style.floor);
        self.render_column(left, right, &mut pixels);
        grid.write_column(slot, &pixels);
        self.scratch = pixels;
    }

    /// Render one pixel column, top row first.
    pub fn render_column(&self, left: &SpectralColumn, right: &SpectralColumn, out: &mut [Rgba]) {
        let height = out.len();
        for (row, pixel) in out.iter_mut().rev().enumerate() {
            let position = self.style.bin_position(row, height);
            *pixel = self.render_pixel(left, right, position);
        }
    }

    fn render_pixel(&self, left: &SpectralColumn, right: &SpectralColumn, position: f32) -> Rgba {
        let left_sample = Sample::read(left, position);
        let right_sample = Sample::read(right, position);

        match self.style.blend {
            ChannelBlend::Left => self.map(self.filtered(left_sample)),
            ChannelBlend::Right => self.map(self.filtered(right_sample)),
            ChannelBlend::MaxHold => {
                let mut use_left = left_sample.value >= right_sample.value;
                if self.style.peak_only {
                    match (left_sample.peak, right_sample.peak) {
                        (false, false) => {
                            return self.map(self.filtered(Sample {
                                value: 0.0,
                                peak: false,
                            }));
                        }
                        (true, false) => use_left = true,
                        (false, true) => use_left = false,
                        (true, true) => {}
                    }
                }
                self.map(if use_left {
                    self.filtered(left_sample)
                } else {
                    self.filtered(right_sample)
                })
            }
            ChannelBlend::Additive => {
                let (l, r) = (self.filtered(left_sample), self.filtered(right_sample));
                if l.is_none() && r.is_none() {
                    return self.style.floor;
                }
                let weight = |value: Option<f32>| self.scale(value.unwrap_or(0.0));
                LEFT_BASE
                    .scaled(weight(l))
                    .saturating_add(RIGHT_BASE.scaled(weight(r)))
            }
        }
    }

    /// Raw magnitude after peak-only filtering, or `None` below threshold.
    fn filtered(&self, sample: Sample) -> Option<f32> {
        let value = if self.style.peak_only && !sample.peak {
            0.0
        } else {
            sample.value
        };
        (value >= self.style.threshold).then_some(value)
    }

    #[inline]
    fn scale(&self, value: f32) -> f32 {
        (value * self.style.multiplier).clamp(0.0, 1.0)
    }

    fn map(&self, value: Option<f32>) -> Rgba {
        match value {
            Some(value) => self.palette.lookup(self.scale(value)),
            None => self.style.floor,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f32,
    peak: bool,
}

impl Sample {
    fn read(column: &SpectralColumn, position: f32) -> Self {
        if column.is_empty() {
            return Self {
                value: 0.0,
                peak: false,
            };
        }
        let last = column.len() - 1;
        let position = position.clamp(0.0, last as f32);
        Self {
            value: interpolate(&column.magnitudes, position),
            peak: column.is_peak((position.round() as usize).min(last)),
        }
    }
}
