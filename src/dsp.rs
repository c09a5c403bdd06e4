//! Analysis pipeline: window generation, elementwise buffer maths, the
//! per-channel gain/delay stages, frame accumulation and the spectral
//! transform that turns frames into history columns.

pub mod accumulator;
pub mod delay;
pub mod gain;
pub mod spectrogram;
pub mod vector;
pub mod window;

/// Helper trait for stages that can be reconfigured without being rebuilt.
pub trait Reconfigurable<Cfg> {
    fn update_config(&mut self, config: Cfg);
}
