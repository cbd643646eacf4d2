use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::storage::compress::CompatMode;

/// Configuration for a mirror node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Base directory for all durable data.
    pub data_dir: PathBuf,
    /// Path to the genesis file.
    pub genesis_path: PathBuf,
    /// Bind address for the REST surface.
    pub rest_bind: SocketAddr,
    /// Read-path tolerance for index values written before compression.
    pub compat_mode: CompatMode,
    /// LMDB map size in bytes for each environment.
    pub lmdb_map_size: usize,
    /// When set, the node serves queries without consuming the block feed.
    pub disable_sync: bool,
}

impl NodeConfig {
    pub fn new(data_dir: impl AsRef<Path>, genesis_path: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            genesis_path: genesis_path.as_ref().to_path_buf(),
            rest_bind: ([127, 0, 0, 1], 1317).into(),
            compat_mode: CompatMode::Enabled,
            lmdb_map_size: 2 << 30,
            disable_sync: false,
        }
    }

    pub fn with_rest_bind(mut self, bind: SocketAddr) -> Self {
        self.rest_bind = bind;
        self
    }

    pub fn with_compat_mode(mut self, mode: CompatMode) -> Self {
        self.compat_mode = mode;
        self
    }

    pub fn with_lmdb_map_size(mut self, size: usize) -> Self {
        self.lmdb_map_size = size;
        self
    }

    pub fn with_disable_sync(mut self, disable: bool) -> Self {
        self.disable_sync = disable;
        self
    }

    /// Directory of the primary state/block store.
    pub fn chain_db_dir(&self) -> PathBuf {
        self.data_dir.join("chain")
    }

    /// Directory of the secondary index store.
    pub fn index_db_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }
}
