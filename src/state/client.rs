use std::sync::Arc;

use parking_lot::RwLock;

use crate::api::types::{Block, BlockIdentifier, ChainState, EventCollector};
use crate::state::engine::{
    BlockApplyOutcome, CommitResponse, EngineResult, InfoResponse, InitChainRequest,
    InitChainResponse, OfferSnapshotResult, QueryRequest, QueryResponse, SnapshotMeta,
    StateTransitionEngine,
};

/// Request half of a completed exchange, as seen by the callback.
#[derive(Debug, Clone)]
pub enum EngineRequest {
    Echo { message: String },
    Info,
    Query(QueryRequest),
    ApplyBlock { height: u64 },
    InitChain { chain_id: String },
    Commit,
    ListSnapshots,
    OfferSnapshot(SnapshotMeta),
}

/// Response half of a completed exchange.
#[derive(Debug, Clone)]
pub enum EngineResponse {
    Echo { message: String },
    Info(InfoResponse),
    Query(QueryResponse),
    ApplyBlock { height: u64 },
    InitChain(InitChainResponse),
    Commit(CommitResponse),
    ListSnapshots(Vec<SnapshotMeta>),
    OfferSnapshot(OfferSnapshotResult),
}

/// A finished request/response pair returned by the notify-style calls.
#[derive(Debug, Clone)]
pub struct CompletedExchange {
    pub request: EngineRequest,
    pub response: EngineResponse,
}

pub type EngineCallback = Box<dyn Fn(&EngineRequest, &EngineResponse) + Send + Sync>;

/// Synchronization facade in front of the state-transition engine.
///
/// Every engine operation is exposed in two calling conventions: a direct
/// synchronous call, and a `*_notify` variant that performs the same call
/// and then invokes the registered callback exactly once with the matching
/// request/response pair.
///
/// Locking discipline: mutating operations (`apply_block`, `init_chain`,
/// `commit`, snapshot lifecycle, `set_event_sink`) hold the write lock for
/// their entire duration, serializing all mutation. Informational reads
/// (`info`, `echo`) hold the read lock, so they interleave with each other
/// but never with a writer. `query` takes **no lock at all** — the engine
/// contract guarantees point queries are safe under concurrent mutation,
/// and queries must not stall behind block application.
///
/// Callbacks run while the corresponding lock is still held and must not
/// reenter the client.
pub struct ConcurrentEngineClient {
    engine: Arc<dyn StateTransitionEngine>,
    gate: Arc<RwLock<()>>,
    callback: RwLock<Option<EngineCallback>>,
}

impl ConcurrentEngineClient {
    pub fn new(engine: Arc<dyn StateTransitionEngine>, gate: Option<Arc<RwLock<()>>>) -> Self {
        Self {
            engine,
            gate: gate.unwrap_or_default(),
            callback: RwLock::new(None),
        }
    }

    /// The lock shared with any other component that coordinates with the
    /// engine.
    pub fn gate(&self) -> Arc<RwLock<()>> {
        Arc::clone(&self.gate)
    }

    /// Registers the callback notified by the `*_notify` calls, replacing
    /// any previously registered one.
    pub fn set_callback(&self, callback: EngineCallback) {
        let _guard = self.gate.write();
        *self.callback.write() = Some(callback);
    }

    fn notify(&self, request: EngineRequest, response: EngineResponse) -> CompletedExchange {
        if let Some(callback) = self.callback.read().as_ref() {
            callback(&request, &response);
        }
        CompletedExchange { request, response }
    }

    // --- direct calling convention ---

    pub fn echo(&self, message: String) -> String {
        let _guard = self.gate.read();
        message
    }

    pub fn info(&self) -> EngineResult<InfoResponse> {
        let _guard = self.gate.read();
        self.engine.info()
    }

    /// Point query against current state. Deliberately lock-free; see the
    /// type-level documentation.
    pub fn query(&self, req: QueryRequest) -> EngineResult<QueryResponse> {
        self.engine.query(req)
    }

    pub fn init_chain(&self, req: InitChainRequest) -> EngineResult<InitChainResponse> {
        let _guard = self.gate.write();
        self.engine.init_chain(req)
    }

    pub fn apply_block(
        &self,
        state: &ChainState,
        block_id: &BlockIdentifier,
        block: &Block,
    ) -> EngineResult<BlockApplyOutcome> {
        let _guard = self.gate.write();
        self.engine.apply_block(state, block_id, block)
    }

    pub fn commit(&self) -> EngineResult<CommitResponse> {
        let _guard = self.gate.write();
        self.engine.commit()
    }

    pub fn list_snapshots(&self) -> EngineResult<Vec<SnapshotMeta>> {
        let _guard = self.gate.write();
        self.engine.list_snapshots()
    }

    pub fn offer_snapshot(&self, snapshot: SnapshotMeta) -> EngineResult<OfferSnapshotResult> {
        let _guard = self.gate.write();
        self.engine.offer_snapshot(snapshot)
    }

    pub fn set_event_sink(&self, sink: Arc<EventCollector>) {
        let _guard = self.gate.write();
        self.engine.set_event_sink(sink);
    }

    // --- notify calling convention ---

    pub fn echo_notify(&self, message: String) -> CompletedExchange {
        let _guard = self.gate.read();
        self.notify(
            EngineRequest::Echo {
                message: message.clone(),
            },
            EngineResponse::Echo { message },
        )
    }

    pub fn info_notify(&self) -> EngineResult<CompletedExchange> {
        let _guard = self.gate.read();
        let res = self.engine.info()?;
        Ok(self.notify(EngineRequest::Info, EngineResponse::Info(res)))
    }

    pub fn query_notify(&self, req: QueryRequest) -> EngineResult<CompletedExchange> {
        let res = self.engine.query(req.clone())?;
        Ok(self.notify(EngineRequest::Query(req), EngineResponse::Query(res)))
    }

    pub fn init_chain_notify(&self, req: InitChainRequest) -> EngineResult<CompletedExchange> {
        let _guard = self.gate.write();
        let res = self.engine.init_chain(req.clone())?;
        Ok(self.notify(
            EngineRequest::InitChain {
                chain_id: req.chain_id,
            },
            EngineResponse::InitChain(res),
        ))
    }

    pub fn apply_block_notify(
        &self,
        state: &ChainState,
        block_id: &BlockIdentifier,
        block: &Block,
    ) -> EngineResult<(BlockApplyOutcome, CompletedExchange)> {
        let _guard = self.gate.write();
        let outcome = self.engine.apply_block(state, block_id, block)?;
        let exchange = self.notify(
            EngineRequest::ApplyBlock {
                height: block.header.height,
            },
            EngineResponse::ApplyBlock {
                height: outcome.next_state.last_block_height,
            },
        );
        Ok((outcome, exchange))
    }

    pub fn commit_notify(&self) -> EngineResult<CompletedExchange> {
        let _guard = self.gate.write();
        let res = self.engine.commit()?;
        Ok(self.notify(EngineRequest::Commit, EngineResponse::Commit(res)))
    }

    pub fn list_snapshots_notify(&self) -> EngineResult<CompletedExchange> {
        let _guard = self.gate.write();
        let res = self.engine.list_snapshots()?;
        Ok(self.notify(
            EngineRequest::ListSnapshots,
            EngineResponse::ListSnapshots(res),
        ))
    }

    pub fn offer_snapshot_notify(&self, snapshot: SnapshotMeta) -> EngineResult<CompletedExchange> {
        let _guard = self.gate.write();
        let res = self.engine.offer_snapshot(snapshot.clone())?;
        Ok(self.notify(
            EngineRequest::OfferSnapshot(snapshot),
            EngineResponse::OfferSnapshot(res),
        ))
    }
}
