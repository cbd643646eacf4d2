//! Secondary indexing: the all-or-nothing per-block pipeline and the
//! built-in indexers.

pub mod block;
pub mod height;
pub mod pipeline;
pub mod tx;
