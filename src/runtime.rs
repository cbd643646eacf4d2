//! Replay runtime: block feed, injection reactor, sync loop, and metrics.

pub mod feed;
pub mod metrics;
pub mod reactor;
pub mod sync;
