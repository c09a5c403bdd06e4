use super::raster::Rgba;
use crate::util::audio::lerp;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const PALETTE_SIZE: usize = 256;

/// Selectable colour maps, in cycling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Colormap {
    #[default]
    Magma,
    Plasma,
    Inferno,
    Viridis,
    Cividis,
    Turbo,
    GreenPink,
}

impl Colormap {
    pub const ALL: [Colormap; 7] = [
        Colormap::Magma,
        Colormap::Plasma,
        Colormap::Inferno,
        Colormap::Viridis,
        Colormap::Cividis,
        Colormap::Turbo,
        Colormap::GreenPink,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Colormap::Magma => "magma",
            Colormap::Plasma => "plasma",
            Colormap::Inferno => "inferno",
            Colormap::Viridis => "viridis",
            Colormap::Cividis => "cividis",
            Colormap::Turbo => "turbo",
            Colormap::GreenPink => "green-pink",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|&candidate| candidate == self)
            .unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn previous(self) -> Self {
        Self::from_index(self.index() + Self::ALL.len() - 1)
    }

    /// Shared lookup table for this map, built on first use.
    pub fn palette(self) -> &'static Palette {
        static PALETTES: OnceLock<Vec<Palette>> = OnceLock::new();
        let palettes =
            PALETTES.get_or_init(|| Self::ALL.iter().map(|&map| Palette::build(map)).collect());
        &palettes[self.index()]
    }

    fn sample(self, t: f64) -> Rgba {
        let gradient = match self {
            Colormap::Magma => colorous::MAGMA,
            Colormap::Plasma => colorous::PLASMA,
            Colormap::Inferno => colorous::INFERNO,
            Colormap::Viridis => colorous::VIRIDIS,
            Colormap::Cividis => colorous::CIVIDIS,
            Colormap::Turbo => colorous::TURBO,
            Colormap::GreenPink => return sample_stops(&GREEN_PINK_STOPS, t as f32),
        };
        let color = gradient.eval_continuous(t);
        Rgba::opaque(color.r, color.g, color.b)
    }
}

impl std::fmt::Display for Colormap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const GREEN_PINK_STOPS: [Rgba; 4] = [
    Rgba::opaque(0, 0, 0),
    Rgba::opaque(0, 191, 128),
    Rgba::opaque(255, 64, 128),
    Rgba::opaque(255, 255, 255),
];

fn sample_stops(stops: &[Rgba], t: f32) -> Rgba {
    let Some(&last) = stops.last() else {
        return Rgba::BLACK;
    };
    let position = t.clamp(0.0, 1.0) * (stops.len() - 1) as f32;
    let index = position.floor() as usize;
    if index >= stops.len() - 1 {
        return last;
    }
    let fraction = position - index as f32;
    let (a, b) = (stops[index], stops[index + 1]);
    let mix = |x: u8, y: u8| lerp(x as f32, y as f32, fraction).round() as u8;
    Rgba::opaque(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// 256-entry lookup from a normalized magnitude to a colour.
#[derive(Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [Rgba; PALETTE_SIZE],
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("first", &self.entries[0])
            .field("last", &self.entries[PALETTE_SIZE - 1])
            .finish()
    }
}

impl Palette {
    pub fn build(colormap: Colormap) -> Self {
        let mut entries = [Rgba::BLACK; PALETTE_SIZE];
        for (index, entry) in entries.iter_mut().enumerate() {
            *entry = colormap.sample(index as f64 / (PALETTE_SIZE - 1) as f64);
        }
        Self { entries }
    }

    /// Colour for `value` in `[0, 1]`; out-of-range values clamp.
    #[inline]
    pub fn lookup(&self, value: f32) -> Rgba {
        self.entries[Self::index_of(value)]
    }

    #[inline]
    pub fn index_of(value: f32) -> usize {
        if value.is_nan() {
            return 0;
        }
        (value.clamp(0.0, 1.0) * (PALETTE_SIZE - 1) as f32).round() as usize
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn entries(&self) -> &[Rgba; PALETTE_SIZE] {
        &self.entries
    }
}
