use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::api::error::MirrorResult;

/// One operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Set { key, .. } => key,
            BatchOp::Delete { key } => key,
        }
    }
}

/// Byte-string key-value store.
///
/// A `get` on a missing key returns `Ok(None)`, never an error. Batches
/// commit atomically: either every operation becomes visible or none does.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> MirrorResult<Option<Vec<u8>>>;
    fn set(&self, key: &[u8], value: &[u8]) -> MirrorResult<()>;
    fn delete(&self, key: &[u8]) -> MirrorResult<()>;

    /// Applies all operations atomically. `sync` requests an fsync before
    /// returning.
    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> MirrorResult<()>;

    /// Returns all entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> MirrorResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Opens a new write batch against this store.
    fn new_batch(&self) -> Box<dyn KvBatch>;
}

/// Accumulates writes for one atomic commit. Dropping an unwritten batch
/// discards it.
pub trait KvBatch: Send {
    fn set(&mut self, key: &[u8], value: &[u8]) -> MirrorResult<()>;
    fn delete(&mut self, key: &[u8]) -> MirrorResult<()>;
    fn write(&mut self) -> MirrorResult<()>;
    fn write_sync(&mut self) -> MirrorResult<()>;
}

/// Batch that buffers operations and hands them to the owning store on write.
pub struct BufferedBatch {
    target: Arc<dyn KvStore>,
    ops: Vec<BatchOp>,
}

impl BufferedBatch {
    pub fn new(target: Arc<dyn KvStore>) -> Self {
        Self {
            target,
            ops: Vec::new(),
        }
    }
}

impl KvBatch for BufferedBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> MirrorResult<()> {
        self.ops.push(BatchOp::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> MirrorResult<()> {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
        Ok(())
    }

    fn write(&mut self) -> MirrorResult<()> {
        self.target.write_batch(std::mem::take(&mut self.ops), false)
    }

    fn write_sync(&mut self) -> MirrorResult<()> {
        self.target.write_batch(std::mem::take(&mut self.ops), true)
    }
}

/// In-memory store used by tests and embedders that do not need durability.
#[derive(Clone, Default)]
pub struct MemKvStore {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &[u8]) -> MirrorResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> MirrorResult<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> MirrorResult<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>, _sync: bool) -> MirrorResult<()> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                BatchOp::Set { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> MirrorResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let map = self.map.read();
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn new_batch(&self) -> Box<dyn KvBatch> {
        Box::new(BufferedBatch::new(Arc::new(self.clone())))
    }
}
