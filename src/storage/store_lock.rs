use std::fs::{self, File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::api::error::{MirrorError, MirrorResult};

const LOCK_FILE_NAME: &str = "chainmirror.lock";

/// Exclusive lock over the data directory, preventing two node processes
/// from mutating the same store.
pub struct DataDirLock {
    file: File,
}

impl DataDirLock {
    pub fn acquire(data_dir: &Path) -> MirrorResult<Self> {
        fs::create_dir_all(data_dir)?;

        let lock_path = data_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        if FileExt::try_lock_exclusive(&file).is_err() {
            return Err(MirrorError::DataDirLocked { path: lock_path });
        }

        Ok(Self { file })
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        // Best effort; the OS releases the lock when the descriptor closes.
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquisition_fails_while_held() {
        let tmp = tempfile::tempdir().unwrap();
        let _held = DataDirLock::acquire(tmp.path()).unwrap();
        assert!(matches!(
            DataDirLock::acquire(tmp.path()),
            Err(MirrorError::DataDirLocked { .. })
        ));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        drop(DataDirLock::acquire(tmp.path()).unwrap());
        assert!(DataDirLock::acquire(tmp.path()).is_ok());
    }
}
