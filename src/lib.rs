//! # Chainmirror
//!
//! A deterministic block-replay engine: consumes finalized blocks from a
//! feed, applies them through a pluggable state-transition engine, persists
//! chain state with one-generation crash-safe rollback, fans results out to
//! secondary indexers, and serves them over a read-only REST API.
//!
//! ## Features
//!
//! - **Crash-safe replay**: every height commits atomically through a write
//!   window, with the inverse batch retained until the next height lands
//! - **Lock-free queries**: engine queries bypass the write lock and read a
//!   consistent prior state while blocks apply
//! - **All-or-nothing indexing**: per-block indexer runs stage into a single
//!   batch, so the index store only ever holds complete heights
//! - **Compressed indexes**: index values are zstd-compressed, with a
//!   compatibility read path for stores written before compression
//!
//! ## Quick Start
//!
//! ```ignore
//! use chainmirror::{MirrorNode, NodeConfig};
//! use chainmirror::runtime::feed::ChannelBlockFeed;
//! use std::sync::Arc;
//!
//! chainmirror::api::node::init_tracing();
//!
//! let config = NodeConfig::new("./data", "./genesis.json");
//! let (feed, publisher) = ChannelBlockFeed::new();
//! let engine = Arc::new(MyEngine::new());
//!
//! // hand `publisher` to the component receiving finalized blocks
//! let node = MirrorNode::new(config, engine, Arc::new(feed))?;
//! node.run()?;
//! # Ok::<(), chainmirror::MirrorError>(())
//! ```

pub mod api;
pub mod index;
pub mod net;
pub mod runtime;
pub mod state;
pub mod storage;

pub use api::config::NodeConfig;
pub use api::error::{MirrorError, MirrorResult};
pub use api::genesis::GenesisDoc;
pub use api::node::MirrorNode;
pub use api::types::*;
pub use index::pipeline::{IndexFn, IndexerRegistry};
pub use net::rest::{build_router, RestContext, RestError};
pub use runtime::feed::{BlockEnvelope, BlockFeed, BlockPublisher, ChannelBlockFeed};
pub use runtime::metrics::{MetricsSnapshot, MirrorMetrics};
pub use runtime::reactor::BlockReactor;
pub use runtime::sync::SyncRunner;
pub use state::client::{CompletedExchange, ConcurrentEngineClient, EngineRequest, EngineResponse};
pub use state::engine::{
    BlockApplyOutcome, EngineError, EngineResult, StateTransitionEngine,
};
pub use storage::chain::ChainStore;
pub use storage::compress::{CompatMode, CompressedKv};
pub use storage::kv::{BatchOp, KvBatch, KvStore, MemKvStore};
pub use storage::lmdb::LmdbKvStore;
pub use storage::store_lock::DataDirLock;
pub use storage::window::{RollbackBatch, WriteWindowStore};
