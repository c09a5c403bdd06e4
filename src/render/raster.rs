use bytemuck::{Pod, Zeroable};

pub const DEFAULT_RASTER_WIDTH: usize = 1000;
pub const DEFAULT_RASTER_HEIGHT: usize = 460;
pub const DEFAULT_COLUMN_WIDTH: usize = 2;

/// One 8-bit RGBA pixel, laid out exactly as it is packed for display.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Scale the colour channels by `factor` in `[0, 1]`; alpha is kept.
    pub fn scaled(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let scale = |c: u8| (c as f32 * factor).round() as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }

    /// Channel-wise sum clamped at 255.
    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            r: self.r.saturating_add(other.r),
            g: self.g.saturating_add(other.g),
            b: self.b.saturating_add(other.b),
            a: self.a.max(other.a),
        }
    }
}

/// Raster dimensions in pixels. Each history column occupies `column_width`
/// pixel columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLayout {
    pub width: usize,
    pub height: usize,
    pub column_width: usize,
}

impl Default for RasterLayout {
    fn default() -> Self {
        Self {
            width: DEFAULT_RASTER_WIDTH,
            height: DEFAULT_RASTER_HEIGHT,
            column_width: DEFAULT_COLUMN_WIDTH,
        }
    }
}

impl RasterLayout {
    pub fn new(width: usize, height: usize, column_width: usize) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            column_width: column_width.clamp(1, width.max(1)),
        }
    }

    /// Number of history columns that fit across the raster.
    #[inline]
    pub fn visible_columns(&self) -> usize {
        self.width / self.column_width.max(1)
    }
}

/// Owned row-major pixel grid. Row 0 is the top of the image.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    layout: RasterLayout,
    pixels: Vec<Rgba>,
}

impl RasterGrid {
    pub fn new(layout: RasterLayout) -> Self {
        Self {
            pixels: vec![Rgba::BLACK; layout.width * layout.height],
            layout,
        }
    }

    #[inline]
    pub fn layout(&self) -> RasterLayout {
        self.layout
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.layout.height
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.layout.width || y >= self.layout.height {
            return None;
        }
        Some(self.pixels[y * self.layout.width + x])
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    /// Shift every row left by `columns * column_width` pixels. The vacated
    /// strip on the right is painted with `fill`.
    pub fn scroll_left(&mut self, columns: usize, fill: Rgba) {
        let width = self.layout.width;
        let shift = columns.saturating_mul(self.layout.column_width).min(width);
        if shift == 0 {
            return;
        }
        for row in self.pixels.chunks_exact_mut(width) {
            row.copy_within(shift.., 0);
            row[width - shift..].fill(fill);
        }
    }

    /// Write one history column at `slot`, replicating each pixel across the
    /// slot's `column_width` pixel columns. `column` runs top to bottom.
    pub fn write_column(&mut self, slot: usize, column: &[Rgba]) {
        debug_assert_eq!(column.len(), self.layout.height);
        let width = self.layout.width;
        let start = slot * self.layout.column_width;
        if start >= width {
            return;
        }
        let end = (start + self.layout.column_width).min(width);
        for (row, &color) in self.pixels.chunks_exact_mut(width).zip(column) {
            row[start..end].fill(color);
        }
    }

    /// The grid as tightly packed RGBA8 bytes, row-major from the top-left.
    pub fn pack_rgba(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}
