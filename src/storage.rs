//! Persistence backends: key-value abstraction, LMDB environment,
//! compression layer, write window, chain records, and the data-dir lock.

pub mod chain;
pub mod compress;
pub mod kv;
pub mod lmdb;
pub mod store_lock;
pub mod window;

pub mod prelude {
    pub use super::chain::ChainStore;
    pub use super::compress::{CompatMode, CompressedKv};
    pub use super::kv::{BatchOp, BufferedBatch, KvBatch, KvStore, MemKvStore};
    pub use super::lmdb::LmdbKvStore;
    pub use super::store_lock::DataDirLock;
    pub use super::window::{RollbackBatch, WriteWindowStore};
}
