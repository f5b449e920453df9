//! Bounded-wait advisory locking shared by the record store and the ledger.
//!
//! Locks live in a sibling `<store>.lock` file so the store file itself can
//! be replaced while the lock is held. Contention past the wait bound fails
//! the calling operation with `StoreError::LockTimeout`; it never blocks a
//! writer indefinitely.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::errors::StoreError;

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// A held lock. Released on drop; the store write must be flushed and synced
/// before this is dropped.
#[derive(Debug)]
pub(crate) struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

fn lock_path(store_path: &Path) -> std::path::PathBuf {
    let mut os = store_path.as_os_str().to_os_string();
    os.push(".lock");
    std::path::PathBuf::from(os)
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Acquire the lock guarding `store_path`, exclusive or shared, waiting at
/// most `wait`.
pub(crate) fn acquire(
    store_path: &Path,
    exclusive: bool,
    wait: Duration,
) -> Result<StoreLock, StoreError> {
    let path = lock_path(store_path);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| StoreError::io(&path, e))?;

    let started = Instant::now();
    loop {
        // Called through the trait: std 1.89 added inherent try_lock_* methods
        // on File with a different error type, which would otherwise win.
        let attempt = if exclusive {
            FileExt::try_lock_exclusive(&file)
        } else {
            FileExt::try_lock_shared(&file)
        };
        match attempt {
            Ok(()) => return Ok(StoreLock { file }),
            Err(e) if is_contended(&e) => {
                if started.elapsed() >= wait {
                    return Err(StoreError::LockTimeout {
                        path: store_path.to_path_buf(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
                std::thread::sleep(RETRY_INTERVAL.min(wait));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_then_shared_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.json");

        let held = acquire(&store, true, Duration::from_millis(100)).unwrap();
        let err = acquire(&store, true, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        drop(held);

        // Released: a fresh acquisition succeeds immediately.
        acquire(&store, true, Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.json");

        let a = acquire(&store, false, Duration::from_millis(100)).unwrap();
        let b = acquire(&store, false, Duration::from_millis(100)).unwrap();
        drop(a);
        drop(b);
    }
}
