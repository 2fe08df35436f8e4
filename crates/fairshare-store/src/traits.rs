//! Store trait definitions

use std::collections::BTreeMap;

use crate::StoreResult;

/// Main store trait
pub trait UsageStore: Send + Sync {
    /// Load every usage record. A store that has never been written is empty.
    fn load(&self) -> StoreResult<UsageRecords>;

    /// Replace the stored records.
    ///
    /// Only a failure to write the records themselves is an error; side
    /// steps such as the backup copy are reported in the returned
    /// [`SaveReport`].
    fn save(&self, records: &UsageRecords) -> StoreResult<SaveReport>;

    /// Human-readable location for log messages
    fn location(&self) -> String;
}

/// Outcome of the non-fatal steps of a save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// The previous database was copied to the backup location
    pub backed_up: bool,
    /// The change marker was touched
    pub touched: bool,
}

/// Entity name -> accumulated usage, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageRecords(BTreeMap<String, f64>);

impl UsageRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Insert or replace a record, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, usage: f64) -> Option<f64> {
        self.0.insert(name.into(), usage)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, usage)| (name.as_str(), *usage))
    }
}

impl FromIterator<(String, f64)> for UsageRecords {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, f64)> for UsageRecords {
    fn extend<I: IntoIterator<Item = (String, f64)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
