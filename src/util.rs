//! Utility functions and types shared across the engine.

pub mod audio;
pub mod ring_buffer;
pub mod telemetry;

pub use ring_buffer::RingBuffer;
