use std::sync::Arc;
use std::time::Instant;

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::types::{Block, BlockIdentifier, EventCollector};
use crate::storage::kv::{KvBatch, KvStore};

/// One indexer: stages its records into the shared batch for the block being
/// processed. Indexers never write to the store directly.
pub type IndexFn =
    fn(&mut dyn KvBatch, &Block, &BlockIdentifier, &EventCollector) -> MirrorResult<()>;

/// Ordered set of secondary indexers sharing one store.
///
/// All indexers for a block stage into a single batch, committed durably
/// once every indexer has succeeded. The first failure aborts the run and
/// nothing is written, so the index store only ever holds complete heights.
pub struct IndexerRegistry {
    store: Arc<dyn KvStore>,
    indexers: Vec<(&'static str, IndexFn)>,
}

impl IndexerRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            indexers: Vec::new(),
        }
    }

    pub fn register(&mut self, tag: &'static str, indexer: IndexFn) {
        self.indexers.push((tag, indexer));
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.store)
    }

    /// Runs every registered indexer against one block, in registration
    /// order, then commits the combined batch.
    pub fn run(
        &self,
        block: &Block,
        block_id: &BlockIdentifier,
        events: &EventCollector,
    ) -> MirrorResult<()> {
        let started = Instant::now();
        let mut batch = self.store.new_batch();

        for (tag, indexer) in &self.indexers {
            indexer(batch.as_mut(), block, block_id, events).map_err(|source| {
                MirrorError::Indexer {
                    tag,
                    source: Box::new(source),
                }
            })?;
        }

        batch.write_sync()?;
        tracing::info!(
            height = block.header.height,
            indexers = self.indexers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "indexed block"
        );
        Ok(())
    }
}
