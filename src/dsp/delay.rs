//! Per-channel delay lines used to time-align the two inputs.

use crate::util::audio::DEFAULT_SAMPLE_RATE;

/// Largest offset either channel can be delayed by (two seconds at 48 kHz).
pub const MAX_DELAY_SAMPLES: usize = 2 * DEFAULT_SAMPLE_RATE as usize;

/// Rolling sample buffer that holds back the last `offset` samples of every
/// block so they are emitted ahead of the next one.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    offset: usize,
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DelayLine {
    pub fn new(offset: usize) -> Self {
        let offset = offset.min(MAX_DELAY_SAMPLES);
        Self {
            buffer: Vec::with_capacity(offset + DEFAULT_SAMPLE_RATE as usize),
            offset,
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Takes effect from the next processed block.
    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset.min(MAX_DELAY_SAMPLES);
    }

    /// Drop everything but the newest `offset` retained samples, append
    /// `input`, and return the first `input.len()` samples of the result.
    pub fn process(&mut self, input: &[f32]) -> &[f32] {
        let keep = self.buffer.len().min(self.offset);
        let stale = self.buffer.len() - keep;
        if stale > 0 {
            self.buffer.drain(..stale);
        }
        self.buffer.extend_from_slice(input);
        &self.buffer[..input.len()]
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Left and right delay lines driven by one signed offset: negative values
/// delay the left channel, positive values delay the right one.
#[derive(Debug, Clone, Default)]
pub struct ChannelDelay {
    pub left: DelayLine,
    pub right: DelayLine,
    offset: i32,
}

impl ChannelDelay {
    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: i32) {
        let (left, right) = split_offset(offset);
        self.offset = offset.clamp(-(MAX_DELAY_SAMPLES as i32), MAX_DELAY_SAMPLES as i32);
        self.left.set_offset(left);
        self.right.set_offset(right);
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

/// Split a signed inter-channel offset into per-channel sample delays.
pub fn split_offset(offset: i32) -> (usize, usize) {
    let magnitude = (offset.unsigned_abs() as usize).min(MAX_DELAY_SAMPLES);
    if offset < 0 {
        (magnitude, 0)
    } else {
        (0, magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_passes_blocks_through() {
        let mut line = DelayLine::new(0);
        assert_eq!(line.process(&[1.0, 2.0, 3.0]), &[1.0, 2.0, 3.0]);
        assert_eq!(line.process(&[4.0, 5.0]), &[4.0, 5.0]);
    }

    #[test]
    fn offset_holds_back_trailing_samples() {
        let mut line = DelayLine::new(2);
        assert_eq!(line.process(&[1.0, 2.0, 3.0, 4.0]), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(line.process(&[5.0, 6.0, 7.0, 8.0]), &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(line.process(&[9.0, 10.0]), &[7.0, 8.0]);
    }

    #[test]
    fn offsets_longer_than_blocks_accumulate() {
        let mut line = DelayLine::new(5);
        assert_eq!(line.process(&[1.0, 2.0]), &[1.0, 2.0]);
        assert_eq!(line.process(&[3.0, 4.0]), &[1.0, 2.0]);
        assert_eq!(line.process(&[5.0, 6.0]), &[1.0, 2.0]);
        assert_eq!(line.process(&[7.0, 8.0]), &[2.0, 3.0]);
    }

    #[test]
    fn signed_offset_selects_channel() {
        assert_eq!(split_offset(0), (0, 0));
        assert_eq!(split_offset(-256), (256, 0));
        assert_eq!(split_offset(512), (0, 512));
        assert_eq!(split_offset(i32::MIN), (MAX_DELAY_SAMPLES, 0));

        let mut delay = ChannelDelay::default();
        delay.set_offset(-128);
        assert_eq!(delay.left.offset(), 128);
        assert_eq!(delay.right.offset(), 0);
        assert_eq!(delay.offset(), -128);
    }
}
