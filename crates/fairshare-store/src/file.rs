//! File-backed usage database

use fairshare_util::with_suffix;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{SaveReport, StoreResult, UsageLock, UsageRecords, UsageStore, decode_records, encode_records};

/// Suffix of the previous-generation copy
pub const BACKUP_SUFFIX: &str = ".bak";

const TEMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

/// Usage database stored in a single file.
///
/// Saving copies the current file to `<path>.bak`, writes the new content to
/// a temporary file and renames it into place, so at every point either the
/// old or the new database is present under `path`. The touch file is then
/// recreated so other readers can see that the database changed.
pub struct UsageFile {
    path: PathBuf,
    touch_path: PathBuf,
    lock: Option<UsageLock>,
}

impl UsageFile {
    /// Open the database at `path` without locking it
    pub fn open(path: impl AsRef<Path>, touch_path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            touch_path: touch_path.as_ref().to_path_buf(),
            lock: None,
        }
    }

    /// Open the database and hold `<path>.lock` until this store is dropped
    pub fn open_locked(path: impl AsRef<Path>, touch_path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut store = Self::open(path, touch_path);
        store.lock = Some(UsageLock::acquire(with_suffix(&store.path, LOCK_SUFFIX))?);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, BACKUP_SUFFIX)
    }

    pub fn touch_path(&self) -> &Path {
        &self.touch_path
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    fn backup(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        match std::fs::copy(&self.path, self.backup_path()) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    path = %self.backup_path().display(),
                    error = %e,
                    "Could not back up usage database"
                );
                false
            }
        }
    }

    fn write_replace(&self, content: &str) -> StoreResult<()> {
        let temp = with_suffix(&self.path, TEMP_SUFFIX);
        let mut file = File::create(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    fn touch(&self) -> bool {
        match File::create(&self.touch_path) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    path = %self.touch_path.display(),
                    error = %e,
                    "Could not touch usage marker file"
                );
                false
            }
        }
    }
}

impl UsageStore for UsageFile {
    fn load(&self) -> StoreResult<UsageRecords> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No usage database found, starting empty");
            return Ok(UsageRecords::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let decoded = decode_records(&content)?;
        for rejected in &decoded.rejected {
            warn!(
                path = %self.path.display(),
                line = rejected.line,
                reason = %rejected.reason,
                "Skipping usage record"
            );
        }

        debug!(
            path = %self.path.display(),
            records = decoded.records.len(),
            skipped = decoded.rejected.len(),
            "Usage database loaded"
        );
        Ok(decoded.records)
    }

    fn save(&self, records: &UsageRecords) -> StoreResult<SaveReport> {
        let content = encode_records(records)?;

        let backed_up = self.backup();
        self.write_replace(&content)?;
        let touched = self.touch();

        debug!(
            path = %self.path.display(),
            records = records.len(),
            backed_up,
            "Usage database saved"
        );
        Ok(SaveReport { backed_up, touched })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn records(pairs: &[(&str, f64)]) -> UsageRecords {
        pairs
            .iter()
            .map(|(name, usage)| (name.to_string(), *usage))
            .collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageFile::open(dir.path().join("usage"), dir.path().join("usage.touch"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageFile::open(dir.path().join("usage"), dir.path().join("usage.touch"));

        let report = store.save(&records(&[("alice", 100.0), ("bob", 5.5)])).unwrap();
        assert!(!report.backed_up); // nothing to back up on first write
        assert!(report.touched);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.get("alice"), Some(100.0));
        assert_eq!(loaded.get("bob"), Some(5.5));
        assert!(store.touch_path().exists());
        assert!(!with_suffix(store.path(), TEMP_SUFFIX).exists());
    }

    #[test]
    fn test_backup_holds_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageFile::open(dir.path().join("usage"), dir.path().join("usage.touch"));

        store.save(&records(&[("alice", 100.0)])).unwrap();
        let report = store.save(&records(&[("alice", 50.0)])).unwrap();
        assert!(report.backed_up);

        assert_eq!(store.load().unwrap().get("alice"), Some(50.0));
        let backup = UsageFile::open(store.backup_path(), dir.path().join("unused"));
        assert_eq!(backup.load().unwrap().get("alice"), Some(100.0));
    }

    #[test]
    fn test_touch_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let touch = dir.path().join("usage.touch");
        std::fs::write(&touch, "stale content").unwrap();

        let store = UsageFile::open(dir.path().join("usage"), &touch);
        store.save(&UsageRecords::new()).unwrap();
        assert_eq!(std::fs::metadata(&touch).unwrap().len(), 0);
    }

    #[test]
    fn test_failed_backup_does_not_stop_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageFile::open(dir.path().join("usage"), dir.path().join("usage.touch"));
        store.save(&records(&[("alice", 1.0)])).unwrap();

        // a directory in the backup's place cannot be overwritten by a copy
        std::fs::create_dir(store.backup_path()).unwrap();

        let report = store.save(&records(&[("alice", 2.0)])).unwrap();
        assert!(!report.backed_up);
        assert!(report.touched);
        assert_eq!(store.load().unwrap().get("alice"), Some(2.0));
    }

    #[test]
    fn test_failed_touch_does_not_stop_save() {
        let dir = tempfile::tempdir().unwrap();
        let touch = dir.path().join("usage.touch");
        std::fs::create_dir(&touch).unwrap();

        let store = UsageFile::open(dir.path().join("usage"), &touch);
        let report = store.save(&records(&[("alice", 3.0)])).unwrap();
        assert!(!report.touched);
        assert_eq!(store.load().unwrap().get("alice"), Some(3.0));
    }

    #[test]
    fn test_unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageFile::open(
            dir.path().join("missing-dir").join("usage"),
            dir.path().join("usage.touch"),
        );

        let result = store.save(&records(&[("alice", 1.0)]));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_corrupt_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage");
        std::fs::write(&path, "\u{0}\u{1}binary junk\n").unwrap();

        let store = UsageFile::open(&path, dir.path().join("usage.touch"));
        assert!(matches!(store.load(), Err(StoreError::BadHeader(_))));
    }

    #[test]
    fn test_locked_store_excludes_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage");

        let store = UsageFile::open_locked(&path, dir.path().join("usage.touch")).unwrap();
        assert!(store.is_locked());
        assert!(UsageLock::try_acquire(with_suffix(&path, LOCK_SUFFIX))
            .unwrap()
            .is_none());
    }
}
