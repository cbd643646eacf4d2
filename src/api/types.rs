use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::error::MirrorResult;

/// Block height. Heights delivered by the feed are strictly increasing.
pub type BlockId = u64;

/// 32-byte blake3 digest used for block, part-set and transaction hashes.
pub type Hash32 = [u8; 32];

/// Opaque transaction payload as carried inside a block.
pub type RawTx = Vec<u8>;

/// Size of one block fragment when computing the part-set header.
pub const BLOCK_PART_SIZE: usize = 65536;

pub fn zero_hash() -> Hash32 {
    [0u8; 32]
}

/// Canonical hash of an empty result set, used to seed `last_results_hash`
/// before any block has produced results.
pub fn empty_results_hash() -> Hash32 {
    *blake3::hash(&[]).as_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: BlockId,
    /// Block time as unix seconds.
    pub time: u64,
    pub last_block_hash: Hash32,
    /// Application state hash the engine committed for the previous height.
    pub app_hash: Hash32,
    pub data_hash: Hash32,
}

/// A finalized block received from the network feed.
///
/// Blocks are immutable once received; the reactor never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<RawTx>,
}

impl Block {
    /// Content hash over the serialized block.
    pub fn hash(&self) -> MirrorResult<Hash32> {
        let bytes = bincode::serialize(self)?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

/// Fragmentation header over a block's serialized parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSetHeader {
    pub total: u32,
    pub hash: Hash32,
}

/// Identifier of a block: content hash plus fragmentation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIdentifier {
    pub hash: Hash32,
    pub parts: PartSetHeader,
}

impl BlockIdentifier {
    /// Computes the identifier for a block from its serialized form: the
    /// content hash, plus a digest over the per-part digests of
    /// [`BLOCK_PART_SIZE`]-byte fragments.
    pub fn for_block(block: &Block) -> MirrorResult<Self> {
        let bytes = bincode::serialize(block)?;
        let hash = *blake3::hash(&bytes).as_bytes();

        let mut parts_hasher = blake3::Hasher::new();
        let mut total = 0u32;
        for chunk in bytes.chunks(BLOCK_PART_SIZE) {
            parts_hasher.update(blake3::hash(chunk).as_bytes());
            total += 1;
        }
        // an empty block still has one (empty) part
        if total == 0 {
            parts_hasher.update(blake3::hash(&[]).as_bytes());
            total = 1;
        }

        Ok(Self {
            hash,
            parts: PartSetHeader {
                total,
                hash: *parts_hasher.finalize().as_bytes(),
            },
        })
    }
}

/// Chain state after applying some height.
///
/// Exactly one current instance is cached on the reactor and replaced
/// atomically on each successful injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: String,
    /// Height of the last applied block, or zero if none was ever applied.
    pub last_block_height: BlockId,
    pub initial_height: BlockId,
    /// Application state hash reported by the engine.
    pub app_hash: Hash32,
    /// Hash over the previous height's transaction results.
    pub last_results_hash: Hash32,
}

impl ChainState {
    /// State of a chain that has never been initialized. Replaced by
    /// genesis state during `init`, or by the stored state on reload.
    pub fn uninitialized() -> Self {
        Self {
            chain_id: String::new(),
            last_block_height: 0,
            initial_height: 1,
            app_hash: zero_hash(),
            last_results_hash: zero_hash(),
        }
    }
}

/// Result of one transaction, published by the engine during block
/// application and persisted by the tx indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Hex-encoded transaction hash.
    pub tx_hash: String,
    pub height: BlockId,
    /// Position of the transaction within its block.
    pub index: u32,
    /// Zero indicates success.
    pub code: u32,
    pub log: String,
}

/// Per-injection fan-in buffer of transaction results.
///
/// Created fresh before each injection, handed to the engine as its event
/// sink, read by the indexers once injection completes, then discarded.
/// Never reused across heights.
#[derive(Debug, Default)]
pub struct EventCollector {
    records: Mutex<Vec<TxRecord>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the engine for each transaction result.
    pub fn publish(&self, record: TxRecord) {
        self.records.lock().push(record);
    }

    /// Snapshot of everything collected so far.
    pub fn collected(&self) -> Vec<TxRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// Hex-encoded transaction hash for raw tx bytes.
pub fn tx_hash_hex(tx: &[u8]) -> String {
    blake3::hash(tx).to_hex().to_string()
}
