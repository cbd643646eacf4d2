use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::types::{zero_hash, BlockId, Hash32};

/// Genesis descriptor loaded at process bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    #[serde(default)]
    pub genesis_time: String,
    pub initial_height: BlockId,
    /// Hex-encoded application hash, empty for a fresh chain.
    #[serde(default)]
    pub app_hash: String,
    /// Opaque application genesis state, handed to the engine verbatim.
    #[serde(default)]
    pub app_state: serde_json::Value,
}

impl GenesisDoc {
    /// Loads and validates a genesis file, logging its checksum so operators
    /// can compare deployments.
    pub fn from_file(path: &Path) -> MirrorResult<Self> {
        let bytes = fs::read(path)?;
        let checksum = blake3::hash(&bytes).to_hex();
        tracing::info!(path = ?path, %checksum, "loaded genesis file");

        let genesis: GenesisDoc = serde_json::from_slice(&bytes)?;
        genesis.validate()?;
        Ok(genesis)
    }

    pub fn validate(&self) -> MirrorResult<()> {
        if self.chain_id.is_empty() {
            return Err(MirrorError::InvalidGenesis {
                reason: "chain_id must not be empty".into(),
            });
        }
        if self.initial_height == 0 {
            return Err(MirrorError::InvalidGenesis {
                reason: "initial_height must be at least 1".into(),
            });
        }
        if !self.app_hash.is_empty() && self.app_hash_bytes().is_none() {
            return Err(MirrorError::InvalidGenesis {
                reason: "app_hash must be a 64-character hex string".into(),
            });
        }
        Ok(())
    }

    /// Decoded app hash, or the zero hash when genesis declares none.
    pub fn app_hash_or_zero(&self) -> Hash32 {
        self.app_hash_bytes().unwrap_or_else(zero_hash)
    }

    fn app_hash_bytes(&self) -> Option<Hash32> {
        if self.app_hash.len() != 64 {
            return None;
        }
        let mut out = zero_hash();
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(self.app_hash.get(2 * i..2 * i + 2)?, 16).ok()?;
        }
        Some(out)
    }
}
