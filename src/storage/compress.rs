use std::sync::Arc;

use crate::api::error::{MirrorError, MirrorResult};
use crate::storage::kv::{BatchOp, KvBatch, KvStore};

/// Read-path tolerance for values written before the compression layer
/// existed. Set once at store construction; immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompatMode {
    #[default]
    Enabled,
    Disabled,
}

const COMPRESSION_LEVEL: i32 = 0;

/// Wraps any key-value store, transparently compressing values on write and
/// decompressing on read. Keys are never compressed, so `delete` passes
/// through unchanged.
///
/// Range iteration is deliberately unsupported: compressed values break the
/// wrapped store's iterator contract, so this layer narrows it instead of
/// leaking a broken abstraction.
#[derive(Clone)]
pub struct CompressedKv {
    inner: Arc<dyn KvStore>,
    compat: CompatMode,
}

impl CompressedKv {
    pub fn new(inner: Arc<dyn KvStore>, compat: CompatMode) -> Self {
        Self { inner, compat }
    }

    fn decode(&self, key: &[u8], raw: Vec<u8>) -> MirrorResult<Vec<u8>> {
        match zstd::stream::decode_all(raw.as_slice()) {
            Ok(value) => Ok(value),
            // a value written before compression was enabled
            Err(_) if self.compat == CompatMode::Enabled => Ok(raw),
            Err(_) => Err(MirrorError::DecompressionFailed {
                key: hex_key(key),
            }),
        }
    }
}

fn encode(value: &[u8]) -> MirrorResult<Vec<u8>> {
    Ok(zstd::stream::encode_all(value, COMPRESSION_LEVEL)?)
}

fn hex_key(key: &[u8]) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}

impl KvStore for CompressedKv {
    fn get(&self, key: &[u8]) -> MirrorResult<Option<Vec<u8>>> {
        match self.inner.get(key)? {
            Some(raw) => Ok(Some(self.decode(key, raw)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &[u8], value: &[u8]) -> MirrorResult<()> {
        self.inner.set(key, &encode(value)?)
    }

    fn delete(&self, key: &[u8]) -> MirrorResult<()> {
        self.inner.delete(key)
    }

    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> MirrorResult<()> {
        let mut encoded = Vec::with_capacity(ops.len());
        for op in ops {
            encoded.push(match op {
                BatchOp::Set { key, value } => BatchOp::Set {
                    key,
                    value: encode(&value)?,
                },
                delete => delete,
            });
        }
        self.inner.write_batch(encoded, sync)
    }

    fn scan_prefix(&self, _prefix: &[u8]) -> MirrorResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Err(MirrorError::IterationUnsupported)
    }

    fn new_batch(&self) -> Box<dyn KvBatch> {
        Box::new(CompressedBatch {
            inner: self.inner.new_batch(),
        })
    }
}

/// Batch that compresses each `set` the same way the adapter does; deletes
/// and commits pass through.
pub struct CompressedBatch {
    inner: Box<dyn KvBatch>,
}

impl KvBatch for CompressedBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> MirrorResult<()> {
        self.inner.set(key, &encode(value)?)
    }

    fn delete(&mut self, key: &[u8]) -> MirrorResult<()> {
        self.inner.delete(key)
    }

    fn write(&mut self) -> MirrorResult<()> {
        self.inner.write()
    }

    fn write_sync(&mut self) -> MirrorResult<()> {
        self.inner.write_sync()
    }
}
