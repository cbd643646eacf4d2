use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::types::BlockId;
use crate::storage::kv::{BatchOp, BufferedBatch, KvBatch, KvStore};

#[derive(Debug, Clone)]
enum PendingOp {
    Set(Vec<u8>),
    Delete,
}

#[derive(Default)]
struct WindowState {
    write_height: Option<BlockId>,
    pending: Option<BTreeMap<Vec<u8>, PendingOp>>,
}

/// Inverse of one committed flush: applying it restores the store to its
/// state immediately before that flush. At most one generation is retained
/// by the replay loop; the rollback for height H is discarded once height
/// H+1 commits.
pub struct RollbackBatch {
    height: BlockId,
    ops: Vec<BatchOp>,
    store: Arc<dyn KvStore>,
}

impl RollbackBatch {
    pub fn height(&self) -> BlockId {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies the inverse operations durably. Consumes the batch; dropping
    /// an unapplied batch discards it.
    pub fn write_sync(self) -> MirrorResult<()> {
        self.store.write_batch(self.ops, true)
    }
}

/// Height-gated write discipline over a key-value store.
///
/// `set_write_height` declares the height whose mutations the next window
/// will carry; `open` begins buffering writes without making them visible;
/// `flush` commits the buffer atomically and returns the [`RollbackBatch`]
/// that undoes exactly that commit. The single-threaded injection pipeline
/// guarantees at most one open window, so the component does not need to be
/// reentrant-safe.
///
/// Reads see the pending overlay while a window is open, which lets the
/// genesis handshake and chain store read their own uncommitted writes.
#[derive(Clone)]
pub struct WriteWindowStore {
    inner: Arc<dyn KvStore>,
    state: Arc<Mutex<WindowState>>,
}

impl WriteWindowStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(WindowState::default())),
        }
    }

    pub fn set_write_height(&self, height: BlockId) {
        self.state.lock().write_height = Some(height);
    }

    /// Tears down the declared write height. A clear without a prior
    /// `set_write_height` is a no-op.
    pub fn clear_write_height(&self) {
        self.state.lock().write_height = None;
    }

    pub fn write_height(&self) -> Option<BlockId> {
        self.state.lock().write_height
    }

    /// Begins accumulating writes against the declared height.
    pub fn open(&self) -> MirrorResult<()> {
        let mut state = self.state.lock();
        let height = state.write_height.ok_or(MirrorError::MissingWriteHeight)?;
        if state.pending.is_some() {
            return Err(MirrorError::WindowAlreadyOpen { height });
        }
        state.pending = Some(BTreeMap::new());
        Ok(())
    }

    /// Atomically commits everything accumulated since `open` and returns
    /// the inverse batch. The inverse is computed by reading pre-images at
    /// flush time (a compensating-action log, not a write-ahead log): a
    /// crash before `flush` returns simply discards the buffer, leaving the
    /// last flushed state intact.
    pub fn flush(&self) -> MirrorResult<RollbackBatch> {
        let (height, pending) = {
            let mut state = self.state.lock();
            let height = state.write_height.ok_or(MirrorError::NoWindowOpen)?;
            let pending = state.pending.take().ok_or(MirrorError::NoWindowOpen)?;
            (height, pending)
        };

        let mut forward = Vec::with_capacity(pending.len());
        let mut inverse = Vec::with_capacity(pending.len());
        for (key, op) in pending {
            inverse.push(match self.inner.get(&key)? {
                Some(previous) => BatchOp::Set {
                    key: key.clone(),
                    value: previous,
                },
                None => BatchOp::Delete { key: key.clone() },
            });
            forward.push(match op {
                PendingOp::Set(value) => BatchOp::Set { key, value },
                PendingOp::Delete => BatchOp::Delete { key },
            });
        }

        self.inner.write_batch(forward, true)?;

        Ok(RollbackBatch {
            height,
            ops: inverse,
            store: Arc::clone(&self.inner),
        })
    }

    /// Drops the pending buffer without committing it. Used when the height
    /// being written fails partway and the buffered writes must not land.
    pub fn discard(&self) {
        self.state.lock().pending = None;
    }

    fn buffer(&self, key: &[u8], op: PendingOp) -> bool {
        let mut state = self.state.lock();
        match state.pending.as_mut() {
            Some(pending) => {
                pending.insert(key.to_vec(), op);
                true
            }
            None => false,
        }
    }
}

impl KvStore for WriteWindowStore {
    fn get(&self, key: &[u8]) -> MirrorResult<Option<Vec<u8>>> {
        {
            let state = self.state.lock();
            if let Some(pending) = state.pending.as_ref() {
                match pending.get(key) {
                    Some(PendingOp::Set(value)) => return Ok(Some(value.clone())),
                    Some(PendingOp::Delete) => return Ok(None),
                    None => {}
                }
            }
        }
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> MirrorResult<()> {
        if self.buffer(key, PendingOp::Set(value.to_vec())) {
            return Ok(());
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> MirrorResult<()> {
        if self.buffer(key, PendingOp::Delete) {
            return Ok(());
        }
        self.inner.delete(key)
    }

    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> MirrorResult<()> {
        {
            let mut state = self.state.lock();
            if let Some(pending) = state.pending.as_mut() {
                for op in ops {
                    match op {
                        BatchOp::Set { key, value } => {
                            pending.insert(key, PendingOp::Set(value));
                        }
                        BatchOp::Delete { key } => {
                            pending.insert(key, PendingOp::Delete);
                        }
                    }
                }
                return Ok(());
            }
        }
        self.inner.write_batch(ops, sync)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> MirrorResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.inner.scan_prefix(prefix)?.into_iter().collect();
        let state = self.state.lock();
        if let Some(pending) = state.pending.as_ref() {
            for (key, op) in pending.range(prefix.to_vec()..) {
                if !key.starts_with(prefix) {
                    break;
                }
                match op {
                    PendingOp::Set(value) => {
                        merged.insert(key.clone(), value.clone());
                    }
                    PendingOp::Delete => {
                        merged.remove(key);
                    }
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn new_batch(&self) -> Box<dyn KvBatch> {
        Box::new(BufferedBatch::new(Arc::new(self.clone())))
    }
}
