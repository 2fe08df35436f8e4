//! Advisory lock on the usage database
//!
//! Independent invocations may race on the same database. Holding an
//! exclusive `flock` across load, compute and save serializes them; the lock
//! is released when the [`UsageLock`] is dropped.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{StoreError, StoreResult};

/// An exclusive advisory lock held on a lock file
pub struct UsageLock {
    _guard: Flock<File>,
    path: PathBuf,
}

impl UsageLock {
    /// Acquire the lock, waiting for other holders to release it
    pub fn acquire(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(lock) = Self::try_acquire(path)? {
            return Ok(lock);
        }

        info!(path = %path.display(), "Usage database is locked by another process, waiting");
        let guard = Flock::lock(open_lock_file(path)?, FlockArg::LockExclusive)
            .map_err(|(_, errno)| lock_error(path, errno))?;
        debug!(path = %path.display(), "Usage lock acquired");
        Ok(Self {
            _guard: guard,
            path: path.to_path_buf(),
        })
    }

    /// Acquire the lock if nobody else holds it
    pub fn try_acquire(path: impl AsRef<Path>) -> StoreResult<Option<Self>> {
        let path = path.as_ref();
        match Flock::lock(open_lock_file(path)?, FlockArg::LockExclusiveNonblock) {
            Ok(guard) => {
                debug!(path = %path.display(), "Usage lock acquired");
                Ok(Some(Self {
                    _guard: guard,
                    path: path.to_path_buf(),
                }))
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, errno)) => Err(lock_error(path, errno)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lock_file(path: &Path) -> StoreResult<File> {
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?)
}

fn lock_error(path: &Path, errno: Errno) -> StoreError {
    StoreError::Lock {
        path: path.to_path_buf(),
        message: errno.desc().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.lock");

        let first = UsageLock::acquire(&path).unwrap();
        assert_eq!(first.path(), path);
        assert!(UsageLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(UsageLock::try_acquire(&path).unwrap().is_some());
    }
}
