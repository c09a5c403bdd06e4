pub mod transport;

pub use transport::{BlockReceiver, BlockSender, StereoBlock, block_channel};
