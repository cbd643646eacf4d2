use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::api::types::BlockId;

/// Process-wide replay counters, shared across the sync loop and the REST
/// surface.
#[derive(Debug, Default)]
pub struct MirrorMetrics {
    blocks_injected: AtomicU64,
    failed_injections: AtomicU64,
    rollbacks_applied: AtomicU64,
    last_height: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub blocks_injected: u64,
    pub failed_injections: u64,
    pub rollbacks_applied: u64,
    pub last_height: BlockId,
}

impl MirrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_injection(&self, height: BlockId) {
        self.blocks_injected.fetch_add(1, Ordering::Relaxed);
        self.last_height.store(height, Ordering::Relaxed);
    }

    pub fn record_failed_injection(&self) {
        self.failed_injections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_injected: self.blocks_injected.load(Ordering::Relaxed),
            failed_injections: self.failed_injections.load(Ordering::Relaxed),
            rollbacks_applied: self.rollbacks_applied.load(Ordering::Relaxed),
            last_height: self.last_height.load(Ordering::Relaxed),
        }
    }
}
