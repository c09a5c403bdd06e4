//! Bounded hand-off between the audio producer and the engine tick.
//!
//! The producer never blocks: when the channel is full the newest block is
//! discarded and counted. The consumer drains whatever was queued when the
//! tick started, in FIFO order, without waiting.

use crate::util::audio::DEFAULT_SAMPLE_RATE;
use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Blocks queued before the producer starts dropping. With the producer
/// batching around 2048 frames this holds several seconds of audio.
pub const BLOCK_CHANNEL_CAPACITY: usize = 64;
/// Longest block accepted in one message: one second at 48 kHz.
pub const MAX_BLOCK_FRAMES: usize = 48_000;

/// One stereo block of de-interleaved samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBlock {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBlock {
    /// Build a block; the longer channel is truncated to match the shorter.
    pub fn new(mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let frames = left.len().min(right.len());
        left.truncate(frames);
        right.truncate(frames);
        Self { left, right }
    }

    /// Frames usable from both channels.
    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

#[derive(Debug)]
struct Shared {
    sample_rate: RwLock<f32>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

pub fn block_channel(capacity: usize) -> (BlockSender, BlockReceiver) {
    let (sender, receiver) = async_channel::bounded(capacity.max(1));
    let shared = Arc::new(Shared {
        sample_rate: RwLock::new(DEFAULT_SAMPLE_RATE),
        sent: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    (
        BlockSender {
            sender,
            shared: Arc::clone(&shared),
        },
        BlockReceiver {
            receiver,
            shared,
            drop_baseline: 0,
        },
    )
}

#[derive(Debug, Clone)]
pub struct BlockSender {
    sender: Sender<StereoBlock>,
    shared: Arc<Shared>,
}

impl BlockSender {
    /// Queue a block without blocking. Returns `false` when it was dropped.
    pub fn try_send(&self, block: StereoBlock) -> bool {
        match self.sender.try_send(block) {
            Ok(()) => {
                self.shared.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Split `left`/`right` into blocks of at most [`MAX_BLOCK_FRAMES`] and
    /// queue each. Returns how many blocks were accepted.
    pub fn push(&self, left: &[f32], right: &[f32]) -> usize {
        let frames = left.len().min(right.len());
        let mut accepted = 0;
        for (l, r) in left[..frames]
            .chunks(MAX_BLOCK_FRAMES)
            .zip(right[..frames].chunks(MAX_BLOCK_FRAMES))
        {
            if self.try_send(StereoBlock::new(l.to_vec(), r.to_vec())) {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn set_sample_rate(&self, sample_rate: f32) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            *self.shared.sample_rate.write() = sample_rate;
        }
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// The receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug)]
pub struct BlockReceiver {
    receiver: Receiver<StereoBlock>,
    shared: Arc<Shared>,
    drop_baseline: u64,
}

impl BlockReceiver {
    /// Take every block queued at call time, oldest first.
    pub fn drain(&self) -> Vec<StereoBlock> {
        let available = self.receiver.len();
        let mut blocks = Vec::with_capacity(available);
        for _ in 0..available {
            match self.receiver.try_recv() {
                Ok(block) => blocks.push(block),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        blocks
    }

    pub fn sample_rate(&self) -> f32 {
        *self.shared.sample_rate.read()
    }

    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    pub fn sent_blocks(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Producer side has gone away and nothing is left to drain.
    pub fn is_finished(&self) -> bool {
        self.receiver.is_closed() && self.receiver.is_empty()
    }

    /// Log drops that happened since the previous report.
    pub fn report_drops(&mut self) {
        let dropped = self.dropped_blocks();
        if dropped > self.drop_baseline {
            warn!(
                "[transport] dropped {} blocks (total {})",
                dropped - self.drop_baseline,
                dropped
            );
            self.drop_baseline = dropped;
        } else {
            debug!("[transport] {} blocks queued", self.queued());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(value: f32, frames: usize) -> StereoBlock {
        StereoBlock::new(vec![value; frames], vec![-value; frames])
    }

    #[test]
    fn drains_in_fifo_order() {
        let (sender, receiver) = block_channel(8);
        for value in 1..=3 {
            assert!(sender.try_send(block(value as f32, 4)));
        }
        let drained: Vec<f32> = receiver.drain().iter().map(|b| b.left[0]).collect();
        assert_eq!(drained, vec![1.0, 2.0, 3.0]);
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn full_channel_drops_newest() {
        let (sender, receiver) = block_channel(2);
        assert!(sender.try_send(block(1.0, 1)));
        assert!(sender.try_send(block(2.0, 1)));
        assert!(!sender.try_send(block(3.0, 1)));
        assert_eq!(sender.dropped_blocks(), 1);

        let drained: Vec<f32> = receiver.drain().iter().map(|b| b.left[0]).collect();
        assert_eq!(drained, vec![1.0, 2.0]);
        assert_eq!(receiver.sent_blocks(), 2);
    }

    #[test]
    fn long_pushes_are_split() {
        let (sender, receiver) = block_channel(8);
        let left = vec![0.5; MAX_BLOCK_FRAMES * 2 + 10];
        let right = vec![0.25; MAX_BLOCK_FRAMES * 2 + 10];
        assert_eq!(sender.push(&left, &right), 3);

        let frames: Vec<usize> = receiver.drain().iter().map(StereoBlock::frames).collect();
        assert_eq!(frames, vec![MAX_BLOCK_FRAMES, MAX_BLOCK_FRAMES, 10]);
    }

    #[test]
    fn split_push_counts_only_accepted_blocks() {
        let (sender, receiver) = block_channel(2);
        let samples = vec![0.5; MAX_BLOCK_FRAMES * 2 + 1];
        assert_eq!(sender.push(&samples, &samples), 2);
        assert_eq!(sender.dropped_blocks(), 1);
        assert_eq!(receiver.drain().len(), 2);
    }

    #[test]
    fn sample_rate_is_shared() {
        let (sender, receiver) = block_channel(1);
        assert_eq!(receiver.sample_rate(), DEFAULT_SAMPLE_RATE);
        sender.set_sample_rate(44_100.0);
        sender.set_sample_rate(-1.0);
        assert_eq!(receiver.sample_rate(), 44_100.0);
    }

    #[test]
    fn closed_sender_finishes_after_drain() {
        let (sender, receiver) = block_channel(4);
        sender.try_send(block(1.0, 2));
        drop(sender);
        assert!(!receiver.is_finished());
        assert_eq!(receiver.drain().len(), 1);
        assert!(receiver.is_finished());
    }
}
