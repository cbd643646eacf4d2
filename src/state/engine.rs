use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::{Block, BlockId, BlockIdentifier, ChainState, EventCollector, Hash32};

/// Failures reported by the external state-transition engine. Always fatal
/// to the replay process (§ error handling); the adapter adds no error state
/// of its own.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("chain initialization rejected: {reason}")]
    InitChainRejected { reason: String },

    #[error("block application failed at height {height}: {reason}")]
    ApplyFailed { height: BlockId, reason: String },

    #[error("query failed on path '{path}': {reason}")]
    QueryFailed { path: String, reason: String },

    #[error("snapshot operation failed: {reason}")]
    SnapshotFailed { reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitChainRequest {
    pub chain_id: String,
    pub initial_height: BlockId,
    pub app_state: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitChainResponse {
    pub app_hash: Hash32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub data: String,
    pub last_block_height: BlockId,
    pub last_block_app_hash: Hash32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
    /// Height to query at; zero means latest.
    pub height: BlockId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Zero indicates success.
    pub code: u32,
    pub value: Vec<u8>,
    pub log: String,
    pub height: BlockId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    /// Lowest height the engine still needs retained.
    pub retain_height: BlockId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub height: BlockId,
    pub format: u32,
    pub chunks: u32,
    pub hash: Hash32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferSnapshotResult {
    Accept,
    Reject,
}

/// Result of applying one block.
#[derive(Debug, Clone)]
pub struct BlockApplyOutcome {
    pub next_state: ChainState,
    pub retain_height: BlockId,
}

/// External deterministic state-transition engine.
///
/// Given a previous state, a block, and a block identifier, the engine
/// produces the next state, a retain height, and a stream of transaction
/// results published through the installed event sink. The replay pipeline
/// never validates blocks itself; whatever the engine enforces is the rule.
pub trait StateTransitionEngine: Send + Sync {
    fn init_chain(&self, req: InitChainRequest) -> EngineResult<InitChainResponse>;

    fn info(&self) -> EngineResult<InfoResponse>;

    /// Point query against current state.
    ///
    /// Capability contract: implementations must make `query` safe to call
    /// concurrently with an in-flight `apply_block` (for example by reading
    /// an immutable prior snapshot). The concurrent access adapter relies on
    /// this and issues queries without taking any lock.
    fn query(&self, req: QueryRequest) -> EngineResult<QueryResponse>;

    fn apply_block(
        &self,
        state: &ChainState,
        block_id: &BlockIdentifier,
        block: &Block,
    ) -> EngineResult<BlockApplyOutcome>;

    fn commit(&self) -> EngineResult<CommitResponse>;

    fn list_snapshots(&self) -> EngineResult<Vec<SnapshotMeta>>;

    fn offer_snapshot(&self, snapshot: SnapshotMeta) -> EngineResult<OfferSnapshotResult>;

    /// Installs the sink that receives transaction results during
    /// `apply_block`. Replaced before every injection.
    fn set_event_sink(&self, sink: Arc<EventCollector>);
}
