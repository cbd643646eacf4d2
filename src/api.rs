//! Public API surface for chainmirror embedders.
//!
//! Groups configuration, error definitions, block/chain types, genesis
//! handling, and the node facade so downstream crates can wire a mirror node
//! without reaching into the runtime/storage internals.

pub mod config;
pub mod error;
pub mod genesis;
pub mod node;
pub mod types;

pub mod prelude {
    pub use super::config::NodeConfig;
    pub use super::error::{MirrorError, MirrorResult};
    pub use super::genesis::GenesisDoc;
    pub use super::node::MirrorNode;
    pub use super::types::*;
}
