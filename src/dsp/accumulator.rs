use super::vector;
use std::sync::Arc;

/// Collects arbitrary-length pushes into fixed, non-overlapping frames and
/// windows each one as it completes.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    pending: Vec<f32>,
    window: Arc<[f32]>,
}

impl FrameAccumulator {
    pub fn new(window: Arc<[f32]>) -> Self {
        assert!(!window.is_empty(), "frame length must be greater than zero");
        Self {
            pending: Vec::with_capacity(window.len()),
            window,
        }
    }

    #[inline]
    pub fn frame_length(&self) -> usize {
        self.window.len()
    }

    /// Samples carried over from previous pushes.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Replace the window (and so the frame length), dropping any carry.
    pub fn reset_window(&mut self, window: Arc<[f32]>) {
        assert!(!window.is_empty(), "frame length must be greater than zero");
        self.pending.clear();
        let additional = window.len().saturating_sub(self.pending.capacity());
        self.pending.reserve(additional);
        self.window = window;
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Append `samples`. For every frame completed along the way the windowed
    /// frame is handed to `on_frame`, then the carry is reset. Returns the
    /// number of frames emitted by this call.
    pub fn push(&mut self, mut samples: &[f32], mut on_frame: impl FnMut(&mut [f32])) -> usize {
        let frame_length = self.frame_length();
        let mut frames = 0;

        while !samples.is_empty() {
            let take = (frame_length - self.pending.len()).min(samples.len());
            let (head, rest) = samples.split_at(take);
            self.pending.extend_from_slice(head);
            samples = rest;

            if self.pending.len() == frame_length {
                vector::multiply(&mut self.pending, &self.window);
                on_frame(&mut self.pending);
                self.pending.clear();
                frames += 1;
            }
        }

        debug_assert!(self.pending.len() < frame_length);
        frames
    }
}
