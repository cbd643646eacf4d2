use std::sync::Arc;

use crate::api::error::MirrorResult;
use crate::api::types::{Block, BlockId, ChainState};
use crate::storage::kv::KvStore;

const CHAIN_STATE_KEY: &[u8] = b"chain/state";
const BLOCK_KEY_PREFIX: &[u8] = b"chain/block/";

fn block_key(height: BlockId) -> Vec<u8> {
    let mut key = BLOCK_KEY_PREFIX.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

/// Durable chain-state and raw-block records, keyed by height.
///
/// Writes go through whatever store the reactor was wired with; during an
/// injection that is the write-window store, so state and block records land
/// in the same height-scoped batch.
#[derive(Clone)]
pub struct ChainStore {
    kv: Arc<dyn KvStore>,
}

impl ChainStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn load_state(&self) -> MirrorResult<Option<ChainState>> {
        match self.kv.get(CHAIN_STATE_KEY)? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save_state(&self, state: &ChainState) -> MirrorResult<()> {
        self.kv.set(CHAIN_STATE_KEY, &bincode::serialize(state)?)
    }

    pub fn save_block(&self, block: &Block) -> MirrorResult<()> {
        self.kv
            .set(&block_key(block.header.height), &bincode::serialize(block)?)
    }

    pub fn load_block(&self, height: BlockId) -> MirrorResult<Option<Block>> {
        match self.kv.get(&block_key(height))? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{zero_hash, BlockHeader};
    use crate::storage::kv::MemKvStore;

    #[test]
    fn state_and_blocks_round_trip() {
        let store = ChainStore::new(Arc::new(MemKvStore::new()));
        assert!(store.load_state().unwrap().is_none());

        let state = ChainState {
            chain_id: "test-1".into(),
            last_block_height: 9,
            initial_height: 1,
            app_hash: zero_hash(),
            last_results_hash: zero_hash(),
        };
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state().unwrap(), Some(state));

        let block = Block {
            header: BlockHeader {
                chain_id: "test-1".into(),
                height: 9,
                time: 0,
                last_block_hash: zero_hash(),
                app_hash: zero_hash(),
                data_hash: zero_hash(),
            },
            txs: vec![],
        };
        store.save_block(&block).unwrap();
        assert_eq!(store.load_block(9).unwrap(), Some(block));
        assert!(store.load_block(10).unwrap().is_none());
    }
}
