use serde::{Deserialize, Serialize};

use crate::api::error::MirrorResult;
use crate::api::types::{Block, BlockId, BlockIdentifier, EventCollector};
use crate::storage::kv::{KvBatch, KvStore};

const KEY: &[u8] = b"height";

/// Latest fully indexed height, overwritten in place each block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRecord {
    pub height: BlockId,
}

pub fn index_height(
    batch: &mut dyn KvBatch,
    block: &Block,
    _block_id: &BlockIdentifier,
    _events: &EventCollector,
) -> MirrorResult<()> {
    let record = HeightRecord {
        height: block.header.height,
    };
    batch.set(KEY, &serde_json::to_vec(&record)?)
}

pub fn latest_height(store: &dyn KvStore) -> MirrorResult<Option<HeightRecord>> {
    match store.get(KEY)? {
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
    fn marker_tracks_the_latest_block() {
        let store = MemKvStore::new();
        assert!(latest_height(&store).unwrap().is_none());

        for height in [1u64, 2] {
            let block = Block {
                header: BlockHeader {
                    chain_id: "test-1".into(),
                    height,
                    time: 0,
                    last_block_hash: zero_hash(),
                    app_hash: zero_hash(),
                    data_hash: zero_hash(),
                },
                txs: vec![],
            };
            let block_id = BlockIdentifier::for_block(&block).unwrap();
            let mut batch = crate::storage::kv::BufferedBatch::new(Arc::new(store.clone()));
            index_height(&mut batch, &block, &block_id, &EventCollector::new()).unwrap();
            KvBatch::write_sync(&mut batch).unwrap();
        }

        assert_eq!(latest_height(&store).unwrap(), Some(HeightRecord { height: 2 }));
    }
}
