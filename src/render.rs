//! CPU rasterization of column history into a scrolling RGBA image.

pub mod compositor;
pub mod palette;
pub mod raster;

pub use compositor::{ChannelBlend, Compositor, RasterStyle};
pub use palette::Colormap;
pub use raster::{RasterGrid, RasterLayout};
