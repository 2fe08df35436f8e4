//! In-memory store implementation

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{SaveReport, StoreError, StoreResult, UsageRecords, UsageStore};

/// Store that keeps the database in memory (for testing and embedding)
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<UsageRecords>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `records`
    pub fn with_records(records: UsageRecords) -> Self {
        Self {
            records: Mutex::new(records),
            saves: AtomicUsize::new(0),
        }
    }

    /// Copy of the records as last saved
    pub fn snapshot(&self) -> StoreResult<UsageRecords> {
        self.load()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl UsageStore for MemoryStore {
    fn load(&self) -> StoreResult<UsageRecords> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.clone())
    }

    fn save(&self, records: &UsageRecords) -> StoreResult<SaveReport> {
        let mut stored = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        *stored = records.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(SaveReport {
            backed_up: true,
            touched: true,
        })
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
