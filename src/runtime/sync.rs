use std::sync::Arc;

use tokio::sync::watch;

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::genesis::GenesisDoc;
use crate::api::types::{BlockId, EventCollector};
use crate::index::pipeline::IndexerRegistry;
use crate::runtime::feed::{BlockEnvelope, BlockFeed};
use crate::runtime::metrics::MirrorMetrics;
use crate::runtime::reactor::BlockReactor;
use crate::storage::window::{RollbackBatch, WriteWindowStore};

/// Drives the replay loop: one block at a time through the reactor, the
/// indexers, and the write window, retaining exactly one rollback
/// generation.
///
/// The rollback for height H is kept until height H+1 commits, so a failure
/// anywhere in H+1's processing can restore the store to the last durable
/// height before the process exits.
pub struct SyncRunner {
    reactor: BlockReactor,
    window: WriteWindowStore,
    indexers: Arc<IndexerRegistry>,
    feed: Arc<dyn BlockFeed>,
    metrics: Arc<MirrorMetrics>,
    height_tx: watch::Sender<BlockId>,
    rollback: Option<RollbackBatch>,
}

impl SyncRunner {
    pub fn new(
        reactor: BlockReactor,
        window: WriteWindowStore,
        indexers: Arc<IndexerRegistry>,
        feed: Arc<dyn BlockFeed>,
        metrics: Arc<MirrorMetrics>,
        height_tx: watch::Sender<BlockId>,
    ) -> Self {
        Self {
            reactor,
            window,
            indexers,
            feed,
            metrics,
            height_tx,
            rollback: None,
        }
    }

    /// One-time bootstrap: confirms genesis inside a write window scoped to
    /// the initial height, commits it, then reloads state from the store.
    /// Idempotent when history already exists.
    pub fn replay_genesis(&mut self, genesis: &GenesisDoc) -> MirrorResult<()> {
        let initial_height = genesis.initial_height;
        self.window.set_write_height(initial_height);
        self.window.open()?;

        match self.reactor.init(genesis) {
            Ok(()) => {}
            Err(err) => {
                self.window.discard();
                self.window.clear_write_height();
                return Err(err);
            }
        }

        // the genesis commit has no predecessor to restore; drop its inverse
        self.window.flush()?;
        self.reactor.load_initial_state()?;
        self.window.clear_write_height();

        self.height_tx.send_replace(self.reactor.current_height());
        Ok(())
    }

    /// Consumes the feed until it closes. Any processing error is fatal; the
    /// previous height has already been restored by the time it propagates.
    pub fn run(&mut self) -> MirrorResult<()> {
        let from_height = self.reactor.current_height() + 1;
        tracing::info!(from_height, "starting block replay");
        let receiver = self.feed.subscribe(from_height)?;

        while let Ok(envelope) = receiver.recv() {
            self.process(envelope)?;
        }
        tracing::info!("block feed closed, replay stopped");
        Ok(())
    }

    pub fn process(&mut self, envelope: BlockEnvelope) -> MirrorResult<()> {
        let height = envelope.block.header.height;
        self.window.set_write_height(height);
        self.window.open()?;

        match self.apply_and_flush(envelope) {
            Ok(rollback) => {
                // height - 1's rollback is no longer needed
                self.rollback = Some(rollback);
                self.window.clear_write_height();
                self.metrics.record_injection(height);
                self.height_tx.send_replace(height);
                Ok(())
            }
            Err(err) => {
                self.metrics.record_failed_injection();
                self.window.discard();
                self.window.clear_write_height();
                self.restore_previous_height(height);
                Err(err)
            }
        }
    }

    fn apply_and_flush(&mut self, envelope: BlockEnvelope) -> MirrorResult<RollbackBatch> {
        let block_id = envelope.block_id;
        self.reactor.inject(envelope.block)?;

        let block = self
            .reactor
            .current_block()
            .ok_or(MirrorError::MissingChainState)?;
        let events = self
            .reactor
            .current_event_collector()
            .unwrap_or_else(|| Arc::new(EventCollector::new()));
        self.indexers.run(block, &block_id, &events)?;

        self.window.flush()
    }

    fn restore_previous_height(&mut self, failed_height: BlockId) {
        let Some(rollback) = self.rollback.take() else {
            tracing::warn!(failed_height, "no rollback generation retained");
            return;
        };

        tracing::warn!(
            failed_height,
            restore_below = rollback.height(),
            "restoring previous height"
        );
        match rollback.write_sync() {
            Ok(()) => self.metrics.record_rollback(),
            Err(err) => {
                // nothing left to try; the operator has to intervene
                tracing::error!(%err, "rollback failed, store may be inconsistent");
            }
        }
    }

    pub fn reactor(&self) -> &BlockReactor {
        &self.reactor
    }
}
