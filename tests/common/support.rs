use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use chainmirror::api::types::{
    tx_hash_hex, zero_hash, Block, BlockHeader, BlockIdentifier, ChainState, EventCollector,
    TxRecord,
};
use chainmirror::state::engine::{
    BlockApplyOutcome, CommitResponse, EngineError, EngineResult, InfoResponse, InitChainRequest,
    InitChainResponse, OfferSnapshotResult, QueryRequest, QueryResponse, SnapshotMeta,
    StateTransitionEngine,
};

/// Engine whose next app hash is the block hash and whose transactions all
/// succeed, publishing one record per transaction. Optionally rejects a
/// configured height.
pub struct MockEngine {
    sink: Mutex<Option<Arc<EventCollector>>>,
    reject_height: Option<u64>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
            reject_height: None,
        }
    }

    pub fn rejecting(height: u64) -> Self {
        Self {
            sink: Mutex::new(None),
            reject_height: Some(height),
        }
    }
}

impl StateTransitionEngine for MockEngine {
    fn init_chain(&self, _req: InitChainRequest) -> EngineResult<InitChainResponse> {
        Ok(InitChainResponse {
            app_hash: zero_hash(),
        })
    }

    fn info(&self) -> EngineResult<InfoResponse> {
        Ok(InfoResponse {
            data: "mock".into(),
            last_block_height: 0,
            last_block_app_hash: zero_hash(),
        })
    }

    fn query(&self, req: QueryRequest) -> EngineResult<QueryResponse> {
        Ok(QueryResponse {
            code: 0,
            value: req.data,
            log: String::new(),
            height: req.height,
        })
    }

    fn apply_block(
        &self,
        state: &ChainState,
        block_id: &BlockIdentifier,
        block: &Block,
    ) -> EngineResult<BlockApplyOutcome> {
        if self.reject_height == Some(block.header.height) {
            return Err(EngineError::ApplyFailed {
                height: block.header.height,
                reason: "scripted rejection".into(),
            });
        }
        if let Some(sink) = self.sink.lock().as_ref() {
            for (index, tx) in block.txs.iter().enumerate() {
                sink.publish(TxRecord {
                    tx_hash: tx_hash_hex(tx),
                    height: block.header.height,
                    index: index as u32,
                    code: 0,
                    log: String::new(),
                });
            }
        }
        let mut next = state.clone();
        next.last_block_height = block.header.height;
        next.app_hash = block_id.hash;
        Ok(BlockApplyOutcome {
            next_state: next,
            retain_height: 0,
        })
    }

    fn commit(&self) -> EngineResult<CommitResponse> {
        Ok(CommitResponse { retain_height: 0 })
    }

    fn list_snapshots(&self) -> EngineResult<Vec<SnapshotMeta>> {
        Ok(vec![])
    }

    fn offer_snapshot(&self, _snapshot: SnapshotMeta) -> EngineResult<OfferSnapshotResult> {
        Ok(OfferSnapshotResult::Reject)
    }

    fn set_event_sink(&self, sink: Arc<EventCollector>) {
        *self.sink.lock() = Some(sink);
    }
}

pub fn make_block(height: u64, txs: Vec<Vec<u8>>) -> Block {
    Block {
        header: BlockHeader {
            chain_id: "mirror-test-1".into(),
            height,
            time: 1_700_000_000 + height,
            last_block_hash: zero_hash(),
            app_hash: [height as u8; 32],
            data_hash: zero_hash(),
        },
        txs,
    }
}

pub fn write_genesis(dir: &Path, initial_height: u64) -> PathBuf {
    let path = dir.join("genesis.json");
    let doc = serde_json::json!({
        "chain_id": "mirror-test-1",
        "genesis_time": "2023-11-14T00:00:00Z",
        "initial_height": initial_height,
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
    path
}
