use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use parking_lot::Mutex;

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::types::{Block, BlockId, BlockIdentifier};

/// A finalized block plus its precomputed identifier, as delivered by the
/// feed.
#[derive(Debug, Clone)]
pub struct BlockEnvelope {
    pub block: Block,
    pub block_id: BlockIdentifier,
}

/// Source of finalized blocks, in strictly increasing height order starting
/// at the subscription height.
pub trait BlockFeed: Send + Sync {
    /// Single-consumer subscription. A second call fails with
    /// `FeedAlreadySubscribed`.
    fn subscribe(&self, from_height: BlockId) -> MirrorResult<mpsc::Receiver<BlockEnvelope>>;

    /// Whether the feed has caught up with the chain tip.
    fn is_synced(&self) -> bool;
}

/// In-process feed backed by a channel. The publisher half is handed to
/// whatever component receives blocks from the outside world.
pub struct ChannelBlockFeed {
    receiver: Mutex<Option<mpsc::Receiver<BlockEnvelope>>>,
    synced: Arc<AtomicBool>,
}

pub struct BlockPublisher {
    sender: mpsc::Sender<BlockEnvelope>,
    synced: Arc<AtomicBool>,
}

impl ChannelBlockFeed {
    pub fn new() -> (Self, BlockPublisher) {
        let (sender, receiver) = mpsc::channel();
        let synced = Arc::new(AtomicBool::new(false));
        (
            Self {
                receiver: Mutex::new(Some(receiver)),
                synced: Arc::clone(&synced),
            },
            BlockPublisher { sender, synced },
        )
    }
}

impl BlockFeed for ChannelBlockFeed {
    fn subscribe(&self, _from_height: BlockId) -> MirrorResult<mpsc::Receiver<BlockEnvelope>> {
        self.receiver
            .lock()
            .take()
            .ok_or(MirrorError::FeedAlreadySubscribed)
    }

    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

impl BlockPublisher {
    pub fn publish(&self, block: Block) -> MirrorResult<()> {
        let block_id = BlockIdentifier::for_block(&block)?;
        self.sender
            .send(BlockEnvelope { block, block_id })
            .map_err(|_| MirrorError::FeedClosed)
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{zero_hash, BlockHeader};

    fn block(height: BlockId) -> Block {
        Block {
            header: BlockHeader {
                chain_id: "test-1".into(),
                height,
                time: 0,
                last_block_hash: zero_hash(),
                app_hash: zero_hash(),
                data_hash: zero_hash(),
            },
            txs: vec![],
        }
    }

    #[test]
    fn published_blocks_arrive_in_order() {
        let (feed, publisher) = ChannelBlockFeed::new();
        let rx = feed.subscribe(1).unwrap();

        publisher.publish(block(1)).unwrap();
        publisher.publish(block(2)).unwrap();

        assert_eq!(rx.recv().unwrap().block.header.height, 1);
        assert_eq!(rx.recv().unwrap().block.header.height, 2);
    }

    #[test]
    fn second_subscription_is_rejected() {
        let (feed, _publisher) = ChannelBlockFeed::new();
        let _rx = feed.subscribe(1).unwrap();
        assert!(matches!(
            feed.subscribe(1),
            Err(MirrorError::FeedAlreadySubscribed)
        ));
    }

    #[test]
    fn synced_flag_propagates() {
        let (feed, publisher) = ChannelBlockFeed::new();
        assert!(!feed.is_synced());
        publisher.set_synced(true);
        assert!(feed.is_synced());
    }
}
