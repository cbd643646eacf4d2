use serde::{Deserialize, Serialize};

use crate::api::error::MirrorResult;
use crate::api::types::{Block, BlockId, BlockIdentifier, EventCollector};
use crate::storage::kv::{KvBatch, KvStore};

const KEY_PREFIX: &[u8] = b"block/";

fn key(height: BlockId) -> Vec<u8> {
    let mut key = KEY_PREFIX.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

/// Stored per height: the full block and its identifier, ready to serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: Block,
    pub block_id: BlockIdentifier,
}

pub fn index_block(
    batch: &mut dyn KvBatch,
    block: &Block,
    block_id: &BlockIdentifier,
    _events: &EventCollector,
) -> MirrorResult<()> {
    let record = BlockRecord {
        block: block.clone(),
        block_id: block_id.clone(),
    };
    batch.set(&key(block.header.height), &serde_json::to_vec(&record)?)
}

pub fn block_by_height(
    store: &dyn KvStore,
    height: BlockId,
) -> MirrorResult<Option<BlockRecord>> {
    match store.get(&key(height))? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{zero_hash, BlockHeader};
    use crate::storage::kv::MemKvStore;
    use std::sync::Arc;

    #[test]
    fn indexed_block_is_retrievable_by_height() {
        let store = MemKvStore::new();
        let block = Block {
            header: BlockHeader {
                chain_id: "test-1".into(),
                height: 42,
                time: 7,
                last_block_hash: zero_hash(),
                app_hash: zero_hash(),
                data_hash: zero_hash(),
            },
            txs: vec![b"payload".to_vec()],
        };
        let block_id = BlockIdentifier::for_block(&block).unwrap();

        let mut batch = crate::storage::kv::BufferedBatch::new(Arc::new(store.clone()));
        index_block(&mut batch, &block, &block_id, &EventCollector::new()).unwrap();
        crate::storage::kv::KvBatch::write_sync(&mut batch).unwrap();

        let record = block_by_height(&store, 42).unwrap().unwrap();
        assert_eq!(record.block.header.height, 42);
        assert_eq!(record.block_id.hash, block_id.hash);
        assert!(block_by_height(&store, 43).unwrap().is_none());
    }
}
