use std::path::PathBuf;

use thiserror::Error;

use crate::api::types::BlockId;
use crate::state::engine::EngineError;

pub type MirrorResult<T> = Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("heed error: {0}")]
    Heed(#[from] heed::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("range iteration is not supported on a compressed store")]
    IterationUnsupported,

    #[error("decompression failed for key {key}")]
    DecompressionFailed { key: String },

    #[error("no write window is open")]
    NoWindowOpen,

    #[error("write window already open at height {height}")]
    WindowAlreadyOpen { height: BlockId },

    #[error("no write height declared; call set_write_height first")]
    MissingWriteHeight,

    #[error("chain state missing from the durable store")]
    MissingChainState,

    #[error("invalid genesis: {reason}")]
    InvalidGenesis { reason: String },

    #[error("data directory locked at {path:?}")]
    DataDirLocked { path: PathBuf },

    #[error("block feed channel closed")]
    FeedClosed,

    #[error("block feed already subscribed")]
    FeedAlreadySubscribed,

    #[error("indexer '{tag}' failed: {source}")]
    Indexer {
        tag: &'static str,
        #[source]
        source: Box<MirrorError>,
    },
}
