use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::api::config::NodeConfig;
use crate::api::error::MirrorResult;
use crate::api::genesis::GenesisDoc;
use crate::index::pipeline::IndexerRegistry;
use crate::index::{block as block_index, height as height_index, tx as tx_index};
use crate::net::rest::{self, RestContext};
use crate::runtime::feed::BlockFeed;
use crate::runtime::metrics::MirrorMetrics;
use crate::runtime::reactor::BlockReactor;
use crate::runtime::sync::SyncRunner;
use crate::state::client::ConcurrentEngineClient;
use crate::state::engine::StateTransitionEngine;
use crate::storage::chain::ChainStore;
use crate::storage::compress::CompressedKv;
use crate::storage::lmdb::LmdbKvStore;
use crate::storage::store_lock::DataDirLock;
use crate::storage::window::WriteWindowStore;

/// Installs the process-wide tracing subscriber, filtered by `RUST_LOG`
/// (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Fully wired mirror node: durable stores, engine adapter, indexers, sync
/// loop, and REST surface, assembled from a [`NodeConfig`].
///
/// The embedder supplies the state-transition engine and the block feed;
/// everything else is owned here. `run` blocks the calling thread until the
/// feed closes.
pub struct MirrorNode {
    config: NodeConfig,
    genesis: GenesisDoc,
    client: Arc<ConcurrentEngineClient>,
    runner: SyncRunner,
    rest_ctx: RestContext,
    // held for the lifetime of the node
    _lock: DataDirLock,
}

impl MirrorNode {
    pub fn new(
        config: NodeConfig,
        engine: Arc<dyn StateTransitionEngine>,
        feed: Arc<dyn BlockFeed>,
    ) -> MirrorResult<Self> {
        let lock = DataDirLock::acquire(&config.data_dir)?;

        let genesis = GenesisDoc::from_file(&config.genesis_path)?;
        genesis.validate()?;

        let primary = LmdbKvStore::open(&config.chain_db_dir(), config.lmdb_map_size)?;
        let index_env = LmdbKvStore::open(&config.index_db_dir(), config.lmdb_map_size)?;
        let index = Arc::new(CompressedKv::new(Arc::new(index_env), config.compat_mode));

        let window = WriteWindowStore::new(Arc::new(primary));
        let chain = ChainStore::new(Arc::new(window.clone()));

        let client = Arc::new(ConcurrentEngineClient::new(engine, None));
        let reactor = BlockReactor::new(Arc::clone(&client), chain)?;

        let mut registry = IndexerRegistry::new(index);
        registry.register("block", block_index::index_block);
        registry.register("tx", tx_index::index_txs);
        registry.register("height", height_index::index_height);
        let registry = Arc::new(registry);

        let metrics = Arc::new(MirrorMetrics::new());
        let (height_tx, height_rx) = watch::channel(0);

        let rest_ctx = RestContext {
            index_store: registry.store(),
            height_rx,
            feed: Arc::clone(&feed),
            metrics: Arc::clone(&metrics),
        };

        let runner = SyncRunner::new(reactor, window, registry, feed, metrics, height_tx);

        Ok(Self {
            config,
            genesis,
            client,
            runner,
            rest_ctx,
            _lock: lock,
        })
    }

    /// Shared engine adapter, for embedders that issue queries directly.
    pub fn engine_client(&self) -> Arc<ConcurrentEngineClient> {
        Arc::clone(&self.client)
    }

    /// Bootstraps genesis, starts the REST surface, and consumes the block
    /// feed until it closes. With `disable_sync` set, serves queries
    /// indefinitely without consuming the feed.
    pub fn run(mut self) -> MirrorResult<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        self.runner.replay_genesis(&self.genesis)?;
        tracing::info!(
            chain_id = %self.genesis.chain_id,
            height = self.runner.reactor().current_height(),
            "node bootstrapped"
        );

        if self.config.disable_sync {
            tracing::info!("sync disabled, serving queries only");
            return runtime.block_on(rest::serve(
                self.config.rest_bind,
                self.rest_ctx.clone(),
                std::future::pending(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let rest_task = runtime.spawn(rest::serve(
            self.config.rest_bind,
            self.rest_ctx.clone(),
            async {
                let _ = shutdown_rx.await;
            },
        ));

        let result = self.runner.run();

        let _ = shutdown_tx.send(());
        match runtime.block_on(rest_task) {
            Ok(rest_result) => rest_result?,
            Err(join_err) => tracing::error!(%join_err, "rest task aborted"),
        }
        result
    }
}
