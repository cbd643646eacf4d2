use crate::api::error::MirrorResult;
use crate::api::types::{Block, BlockId, BlockIdentifier, EventCollector, TxRecord};
use crate::storage::kv::{KvBatch, KvStore};

const TX_KEY_PREFIX: &[u8] = b"tx/";
const HEIGHT_KEY_PREFIX: &[u8] = b"tx_height/";

fn tx_key(hash_hex: &str) -> Vec<u8> {
    let mut key = TX_KEY_PREFIX.to_vec();
    key.extend_from_slice(hash_hex.as_bytes());
    key
}

fn height_key(height: BlockId) -> Vec<u8> {
    let mut key = HEIGHT_KEY_PREFIX.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

/// Stages one record per transaction result, keyed by hash, plus the full
/// per-height listing under a single key so lookups never need iteration.
pub fn index_txs(
    batch: &mut dyn KvBatch,
    block: &Block,
    _block_id: &BlockIdentifier,
    events: &EventCollector,
) -> MirrorResult<()> {
    let records = events.collected();
    for record in &records {
        batch.set(&tx_key(&record.tx_hash), &serde_json::to_vec(record)?)?;
    }
    batch.set(
        &height_key(block.header.height),
        &serde_json::to_vec(&records)?,
    )
}

pub fn tx_by_hash(store: &dyn KvStore, hash_hex: &str) -> MirrorResult<Option<TxRecord>> {
    match store.get(&tx_key(hash_hex))? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

pub fn txs_by_height(
    store: &dyn KvStore,
    height: BlockId,
) -> MirrorResult<Option<Vec<TxRecord>>> {
    match store.get(&height_key(height))? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{tx_hash_hex, zero_hash, BlockHeader};
    use crate::storage::kv::MemKvStore;
    use std::sync::Arc;

    #[test]
    fn records_are_retrievable_by_hash_and_height() {
        let store = MemKvStore::new();
        let txs = vec![b"first".to_vec(), b"second".to_vec()];
        let block = Block {
            header: BlockHeader {
                chain_id: "test-1".into(),
                height: 3,
                time: 0,
                last_block_hash: zero_hash(),
                app_hash: zero_hash(),
                data_hash: zero_hash(),
            },
            txs: txs.clone(),
        };
        let block_id = BlockIdentifier::for_block(&block).unwrap();

        let events = EventCollector::new();
        for (index, tx) in txs.iter().enumerate() {
            events.publish(TxRecord {
                tx_hash: tx_hash_hex(tx),
                height: 3,
                index: index as u32,
                code: 0,
                log: String::new(),
            });
        }

        let mut batch = crate::storage::kv::BufferedBatch::new(Arc::new(store.clone()));
        index_txs(&mut batch, &block, &block_id, &events).unwrap();
        KvBatch::write_sync(&mut batch).unwrap();

        let record = tx_by_hash(&store, &tx_hash_hex(b"first")).unwrap().unwrap();
        assert_eq!(record.height, 3);
        assert_eq!(record.index, 0);

        let listing = txs_by_height(&store, 3).unwrap().unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[1].tx_hash, tx_hash_hex(b"second"));

        assert!(tx_by_hash(&store, "ffff").unwrap().is_none());
        assert!(txs_by_height(&store, 4).unwrap().is_none());
    }

    #[test]
    fn empty_block_still_writes_the_height_listing() {
        let store = MemKvStore::new();
        let block = Block {
            header: BlockHeader {
                chain_id: "test-1".into(),
                height: 1,
                time: 0,
                last_block_hash: zero_hash(),
                app_hash: zero_hash(),
                data_hash: zero_hash(),
            },
            txs: vec![],
        };
        let block_id = BlockIdentifier::for_block(&block).unwrap();

        let mut batch = crate::storage::kv::BufferedBatch::new(Arc::new(store.clone()));
        index_txs(&mut batch, &block, &block_id, &EventCollector::new()).unwrap();
        KvBatch::write_sync(&mut batch).unwrap();

        assert_eq!(txs_by_height(&store, 1).unwrap(), Some(vec![]));
    }
}
