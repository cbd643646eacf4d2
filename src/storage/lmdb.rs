use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, Error as HeedError};

use crate::api::error::MirrorResult;
use crate::storage::kv::{BatchOp, BufferedBatch, KvBatch, KvStore};

pub const DEFAULT_MAP_SIZE: usize = 2 << 30;

/// LMDB-backed key-value store. Cheap to clone; clones share the same
/// environment.
#[derive(Clone)]
pub struct LmdbKvStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbKvStore {
    pub fn open(path: &Path, map_size: usize) -> MirrorResult<Self> {
        std::fs::create_dir_all(path)?;

        let mut options = EnvOpenOptions::new();
        options.map_size(map_size);
        options.max_dbs(4);

        let env = unsafe {
            match options.open(path) {
                Ok(env) => env,
                Err(HeedError::BadOpenOptions { env, .. }) => env,
                Err(err) => {
                    tracing::error!(path = ?path, map_size, ?err, "failed to open LMDB environment");
                    return Err(err.into());
                }
            }
        };

        let mut txn = env.write_txn()?;
        let db = env.create_database::<Bytes, Bytes>(&mut txn, Some("kv"))?;
        txn.commit()?;

        Ok(Self { env, db })
    }
}

impl KvStore for LmdbKvStore {
    fn get(&self, key: &[u8]) -> MirrorResult<Option<Vec<u8>>> {
        let txn = self.env.read_txn()?;
        Ok(self.db.get(&txn, key)?.map(|value| value.to_vec()))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> MirrorResult<()> {
        let mut txn = self.env.write_txn()?;
        self.db.put(&mut txn, key, value)?;
        txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> MirrorResult<()> {
        let mut txn = self.env.write_txn()?;
        self.db.delete(&mut txn, key)?;
        txn.commit()?;
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>, sync: bool) -> MirrorResult<()> {
        let mut txn = self.env.write_txn()?;
        for op in &ops {
            match op {
                BatchOp::Set { key, value } => self.db.put(&mut txn, key, value)?,
                BatchOp::Delete { key } => {
                    self.db.delete(&mut txn, key)?;
                }
            }
        }
        txn.commit()?;
        if sync {
            self.env.force_sync()?;
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> MirrorResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.env.read_txn()?;
        let mut entries = Vec::new();
        for item in self.db.prefix_iter(&txn, prefix)? {
            let (key, value) = item?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn new_batch(&self) -> Box<dyn KvBatch> {
        Box::new(BufferedBatch::new(Arc::new(self.clone())))
    }
}
