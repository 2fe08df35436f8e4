//! Accounting session

use fairshare_config::{FairshareSettings, Settings, load_config, load_groups};
use fairshare_store::{SaveReport, UsageFile, UsageRecords, UsageStore};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    AccountingError, AccountingResult, DecayEngine, Entity, EntityDetail, EntityId, EntityView,
    FairshareTree, compare, compute_usage_factors, entity_detail, flat_report, recompute,
};

/// What to do with usage records whose entity is not in the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrimPolicy {
    /// Ignore them for computation but write them back on save
    #[default]
    Keep,
    /// Drop them at load; the next save removes them from disk
    Prune,
}

impl TrimPolicy {
    pub fn from_flag(trim: bool) -> Self {
        if trim { Self::Prune } else { Self::Keep }
    }
}

/// One accounting transaction: the tree, its usage and where it is persisted.
///
/// Every operation that changes usage writes the database back before
/// returning.
pub struct Accounting {
    tree: FairshareTree,
    store: Arc<dyn UsageStore>,
    decay: DecayEngine,
    usage_unit: String,
    stale: UsageRecords,
}

impl Accounting {
    /// Load settings, groups and usage from files
    pub fn load_all(
        config_path: impl AsRef<Path>,
        group_path: impl AsRef<Path>,
        usage_path: impl AsRef<Path>,
        trim: TrimPolicy,
    ) -> AccountingResult<Self> {
        let settings = load_config(config_path)?;
        Self::load_with_settings(&settings, group_path, usage_path, trim)
    }

    /// Same as [`Accounting::load_all`] with settings already in hand
    pub fn load_with_settings(
        settings: &Settings,
        group_path: impl AsRef<Path>,
        usage_path: impl AsRef<Path>,
        trim: TrimPolicy,
    ) -> AccountingResult<Self> {
        let decls = load_groups(group_path)?;
        let tree = FairshareTree::build(&decls, settings.fairshare.unknown_shares)?;

        let usage_path = usage_path.as_ref();
        let touch_path = settings.paths.touch_path();
        let store = if settings.paths.lock {
            UsageFile::open_locked(usage_path, &touch_path).map_err(|source| {
                AccountingError::UsageLoad {
                    location: usage_path.display().to_string(),
                    source,
                }
            })?
        } else {
            UsageFile::open(usage_path, &touch_path)
        };

        Self::open(tree, Arc::new(store), &settings.fairshare, trim)
    }

    /// Start a session on a built tree and an opened store
    pub fn open(
        mut tree: FairshareTree,
        store: Arc<dyn UsageStore>,
        settings: &FairshareSettings,
        trim: TrimPolicy,
    ) -> AccountingResult<Self> {
        let records = store.load().map_err(|source| AccountingError::UsageLoad {
            location: store.location(),
            source,
        })?;

        let mut stale = UsageRecords::new();
        for (name, usage) in records.iter() {
            match tree.find(name) {
                Some(id) => tree.get_mut(id).usage = usage,
                None => {
                    warn!(entity = name, usage, "Usage record for entity not in the tree");
                    stale.insert(name, usage);
                }
            }
        }

        if trim == TrimPolicy::Prune && !stale.is_empty() {
            info!(count = stale.len(), "Pruning stale usage records");
            stale = UsageRecords::new();
        }

        recompute(&mut tree);

        info!(
            location = %store.location(),
            entities = tree.len(),
            records = records.len(),
            stale = stale.len(),
            "Accounting session opened"
        );

        Ok(Self {
            tree,
            store,
            decay: DecayEngine::from_settings(settings),
            usage_unit: settings.usage_unit.clone(),
            stale,
        })
    }

    pub fn tree(&self) -> &FairshareTree {
        &self.tree
    }

    /// Look up an entity; `None` when it does not exist
    pub fn find(&self, name: &str) -> Option<&Entity> {
        self.tree.entity(name)
    }

    /// Look up an entity, failing with `NotFound`
    pub fn entity(&self, name: &str) -> AccountingResult<&Entity> {
        self.find(name).ok_or_else(|| AccountingError::not_found(name))
    }

    fn resolve(&self, name: &str) -> AccountingResult<EntityId> {
        self.tree
            .find(name)
            .ok_or_else(|| AccountingError::not_found(name))
    }

    pub fn usage(&self, name: &str) -> AccountingResult<f64> {
        Ok(self.entity(name)?.usage())
    }

    pub fn percentage(&self, name: &str) -> AccountingResult<f64> {
        Ok(self.entity(name)?.tree_percentage())
    }

    /// Replace an entity's usage and persist. Returns the previous value.
    pub fn set_usage(&mut self, name: &str, usage: f64) -> AccountingResult<f64> {
        let id = self.resolve(name)?;
        check_usage(name, usage)?;

        let previous = std::mem::replace(&mut self.tree.get_mut(id).usage, usage);
        compute_usage_factors(&mut self.tree);
        self.save()?;

        info!(entity = name, previous, usage, unit = %self.usage_unit, "Usage set");
        Ok(previous)
    }

    /// Add `delta` (which may be negative) to an entity's usage and persist.
    /// Returns the new value.
    pub fn add_usage(&mut self, name: &str, delta: f64) -> AccountingResult<f64> {
        let id = self.resolve(name)?;
        let usage = self.tree.get(id).usage() + delta;
        check_usage(name, usage)?;

        self.tree.get_mut(id).usage = usage;
        compute_usage_factors(&mut self.tree);
        self.save()?;

        info!(entity = name, delta, usage, unit = %self.usage_unit, "Usage added");
        Ok(usage)
    }

    /// Decay every entity and persist. Returns how many entities changed.
    pub fn decay_all(&mut self) -> AccountingResult<usize> {
        let changed = self.decay.decay(&mut self.tree);
        self.save()?;

        info!(
            factor = self.decay.factor().get(),
            changed,
            "Usage decayed"
        );
        Ok(changed)
    }

    /// Rank two entities. `Less` means `a` has the higher priority.
    pub fn compare(&self, a: &str, b: &str) -> AccountingResult<Ordering> {
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        Ok(compare(&self.tree, a, b))
    }

    /// Drop stale records and persist. Returns how many were removed.
    pub fn trim(&mut self) -> AccountingResult<usize> {
        let removed = self.stale.len();
        self.stale = UsageRecords::new();
        self.save()?;

        info!(removed, "Stale usage records trimmed");
        Ok(removed)
    }

    /// Usage of every entity in the tree plus any stale records kept
    pub fn records(&self) -> UsageRecords {
        let mut records = self.stale.clone();
        records.extend(
            self.tree
                .iter()
                .map(|(_, entity)| (entity.name().to_string(), entity.usage())),
        );
        records
    }

    /// Write the database back
    pub fn save(&self) -> AccountingResult<SaveReport> {
        let records = self.records();
        let report = self
            .store
            .save(&records)
            .map_err(|source| AccountingError::Persistence {
                location: self.store.location(),
                source,
            })?;

        debug!(
            location = %self.store.location(),
            records = records.len(),
            backed_up = report.backed_up,
            touched = report.touched,
            "Usage persisted"
        );
        Ok(report)
    }

    /// Every entity, depth first
    pub fn report(&self) -> Vec<EntityView> {
        flat_report(&self.tree)
    }

    pub fn detail(&self, name: &str) -> AccountingResult<EntityDetail> {
        let id = self.resolve(name)?;
        Ok(entity_detail(&self.tree, id))
    }

    /// Records kept for entities missing from the tree
    pub fn stale_records(&self) -> &UsageRecords {
        &self.stale
    }

    pub fn usage_unit(&self) -> &str {
        &self.usage_unit
    }

    pub fn decay_engine(&self) -> &DecayEngine {
        &self.decay
    }
}

fn check_usage(name: &str, value: f64) -> AccountingResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AccountingError::InvalidUsage {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairshare_config::{DecayFactor, parse_groups};
    use fairshare_store::{MemoryStore, StoreError, StoreResult};

    const GROUPS: &str = "groupX 1 root 10\n\
                          groupY 2 root 10\n\
                          leaf1 3 groupX 10\n\
                          leaf2 4 groupY 10\n";

    fn records(pairs: &[(&str, f64)]) -> UsageRecords {
        pairs
            .iter()
            .map(|(name, usage)| (name.to_string(), *usage))
            .collect()
    }

    fn open_with(store: Arc<MemoryStore>, trim: TrimPolicy) -> Accounting {
        let tree = FairshareTree::build(&parse_groups(GROUPS).unwrap(), 20).unwrap();
        Accounting::open(tree, store, &FairshareSettings::default(), trim).unwrap()
    }

    struct FailingStore;

    impl UsageStore for FailingStore {
        fn load(&self) -> StoreResult<UsageRecords> {
            Ok(UsageRecords::new())
        }

        fn save(&self, _records: &UsageRecords) -> StoreResult<SaveReport> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        fn location(&self) -> String {
            "failing".into()
        }
    }

    #[test]
    fn test_open_applies_usage() {
        let store = Arc::new(MemoryStore::with_records(records(&[
            ("leaf1", 100.0),
            ("leaf2", 50.0),
        ])));
        let acct = open_with(store, TrimPolicy::Keep);

        assert_eq!(acct.usage("leaf1").unwrap(), 100.0);
        assert_eq!(acct.usage("groupX").unwrap(), 0.0);
        assert_eq!(acct.find("groupX").unwrap().tree_usage(), 100.0);
        assert_eq!(acct.percentage("leaf2").unwrap(), 0.25);
        assert_eq!(acct.compare("leaf1", "leaf2").unwrap(), Ordering::Greater);
        assert_eq!(acct.usage_unit(), "cput");
    }

    #[test]
    fn test_missing_entity_is_not_an_error_for_find() {
        let acct = open_with(Arc::new(MemoryStore::new()), TrimPolicy::Keep);

        assert!(acct.find("nonexistent").is_none());
        let err = acct.usage("nonexistent").unwrap_err();
        assert!(matches!(err, AccountingError::NotFound(ref name) if name == "nonexistent"));
        assert!(err.is_per_entity());
        assert!(matches!(
            acct.compare("leaf1", "nonexistent"),
            Err(AccountingError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_and_add_persist() {
        let store = Arc::new(MemoryStore::new());
        let mut acct = open_with(store.clone(), TrimPolicy::Keep);

        assert_eq!(acct.set_usage("leaf1", 40.0).unwrap(), 0.0);
        assert_eq!(acct.add_usage("leaf1", 2.5).unwrap(), 42.5);
        assert_eq!(acct.add_usage("leaf1", -40.0).unwrap(), 2.5);

        assert_eq!(store.save_count(), 3);
        let saved = store.snapshot().unwrap();
        assert_eq!(saved.get("leaf1"), Some(2.5));
        // every entity is written, including the built-in ones
        assert_eq!(saved.get("root"), Some(0.0));
        assert_eq!(saved.get("unknown"), Some(0.0));
        assert_eq!(acct.find("leaf1").unwrap().usage_factor(), Some(10.0));
    }

    #[test]
    fn test_invalid_usage_leaves_state_alone() {
        let store = Arc::new(MemoryStore::new());
        let mut acct = open_with(store.clone(), TrimPolicy::Keep);
        acct.set_usage("leaf1", 10.0).unwrap();

        assert!(matches!(
            acct.add_usage("leaf1", -11.0),
            Err(AccountingError::InvalidUsage { .. })
        ));
        assert!(matches!(
            acct.set_usage("leaf1", f64::NAN),
            Err(AccountingError::InvalidUsage { .. })
        ));
        assert_eq!(acct.usage("leaf1").unwrap(), 10.0);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_decay_all_persists() {
        let store = Arc::new(MemoryStore::with_records(records(&[("leaf1", 100.0)])));
        let mut acct = open_with(store.clone(), TrimPolicy::Keep);

        assert_eq!(acct.decay_all().unwrap(), 1);
        assert_eq!(acct.usage("leaf1").unwrap(), 50.0);
        assert_eq!(store.snapshot().unwrap().get("leaf1"), Some(50.0));
    }

    #[test]
    fn test_decay_uses_settings() {
        let tree = FairshareTree::build(&parse_groups(GROUPS).unwrap(), 0).unwrap();
        let settings = FairshareSettings {
            decay_factor: DecayFactor::new(0.25).unwrap(),
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::with_records(records(&[("leaf2", 80.0)])));
        let mut acct = Accounting::open(tree, store, &settings, TrimPolicy::Keep).unwrap();

        acct.decay_all().unwrap();
        assert_eq!(acct.usage("leaf2").unwrap(), 20.0);
    }

    #[test]
    fn test_stale_records_kept_until_trim() {
        let store = Arc::new(MemoryStore::with_records(records(&[
            ("leaf1", 1.0),
            ("departed", 9.0),
        ])));
        let mut acct = open_with(store.clone(), TrimPolicy::Keep);

        assert_eq!(acct.stale_records().get("departed"), Some(9.0));
        acct.add_usage("leaf1", 1.0).unwrap();
        assert_eq!(store.snapshot().unwrap().get("departed"), Some(9.0));

        assert_eq!(acct.trim().unwrap(), 1);
        assert!(acct.stale_records().is_empty());
        assert!(!store.snapshot().unwrap().contains("departed"));
    }

    #[test]
    fn test_prune_drops_stale_on_next_save() {
        let store = Arc::new(MemoryStore::with_records(records(&[("departed", 9.0)])));
        let acct = open_with(store.clone(), TrimPolicy::Prune);

        assert!(acct.stale_records().is_empty());
        // nothing is written until a save
        assert!(store.snapshot().unwrap().contains("departed"));
        acct.save().unwrap();
        assert!(!store.snapshot().unwrap().contains("departed"));
    }

    #[test]
    fn test_persistence_failure_surfaces() {
        let tree = FairshareTree::build(&parse_groups(GROUPS).unwrap(), 0).unwrap();
        let mut acct = Accounting::open(
            tree,
            Arc::new(FailingStore),
            &FairshareSettings::default(),
            TrimPolicy::Keep,
        )
        .unwrap();

        let err = acct.set_usage("leaf1", 1.0).unwrap_err();
        assert!(matches!(err, AccountingError::Persistence { ref location, .. } if location == "failing"));
        assert!(!err.is_per_entity());
    }

    #[test]
    fn test_detail_and_report() {
        let store = Arc::new(MemoryStore::with_records(records(&[("leaf2", 5.0)])));
        let acct = open_with(store, TrimPolicy::Keep);

        assert_eq!(acct.report().len(), 6);
        let detail = acct.detail("leaf2").unwrap();
        let names: Vec<&str> = detail.path.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["root", "groupY", "leaf2"]);
        assert_eq!(detail.path[1].tree_usage, 5.0);
        assert!(matches!(acct.detail("nobody"), Err(AccountingError::NotFound(_))));
    }

    #[test]
    fn test_trim_policy_from_flag() {
        assert_eq!(TrimPolicy::from_flag(true), TrimPolicy::Prune);
        assert_eq!(TrimPolicy::from_flag(false), TrimPolicy::Keep);
        assert_eq!(TrimPolicy::default(), TrimPolicy::Keep);
    }

    mod files {
        use super::*;
        use fairshare_config::ConfigError;

        fn write_setup(dir: &Path, lock: bool) -> std::path::PathBuf {
            let config = dir.join("fairshare.toml");
            std::fs::write(
                &config,
                format!(
                    "config_version = 1\n\
                     [fairshare]\n\
                     unknown_shares = 20\n\
                     [paths]\n\
                     data_dir = \"{}\"\n\
                     lock = {lock}\n",
                    dir.display()
                ),
            )
            .unwrap();
            std::fs::write(dir.join("resource_group"), GROUPS).unwrap();
            config
        }

        #[test]
        fn test_load_all_first_run() {
            let dir = tempfile::tempdir().unwrap();
            let config = write_setup(dir.path(), true);

            let mut acct = Accounting::load_all(
                &config,
                dir.path().join("resource_group"),
                dir.path().join("usage"),
                TrimPolicy::Keep,
            )
            .unwrap();
            assert_eq!(acct.usage("leaf1").unwrap(), 0.0);
            assert_eq!(acct.percentage("leaf1").unwrap(), 0.25);

            acct.set_usage("leaf1", 100.0).unwrap();
            assert!(dir.path().join("usage").exists());
            assert!(dir.path().join("usage.touch").exists());
            assert!(dir.path().join("usage.lock").exists());
        }

        #[test]
        fn test_load_all_reports_failing_stage() {
            let dir = tempfile::tempdir().unwrap();
            let config = write_setup(dir.path(), false);
            let groups = dir.path().join("resource_group");
            let usage = dir.path().join("usage");

            let err = Accounting::load_all(dir.path().join("missing.toml"), &groups, &usage, TrimPolicy::Keep)
                .err()
                .unwrap();
            assert!(matches!(err, AccountingError::Config(ConfigError::ReadError(_))));

            std::fs::write(&groups, "leaf 1 root many\n").unwrap();
            let err = Accounting::load_all(&config, &groups, &usage, TrimPolicy::Keep)
                .err()
                .unwrap();
            assert!(matches!(err, AccountingError::GroupParse(_)));

            std::fs::write(&groups, "leaf 1 nowhere 1\n").unwrap();
            let err = Accounting::load_all(&config, &groups, &usage, TrimPolicy::Keep)
                .err()
                .unwrap();
            assert!(matches!(err, AccountingError::Tree(_)));

            std::fs::write(&groups, GROUPS).unwrap();
            std::fs::write(&usage, "not a usage database\n").unwrap();
            let err = Accounting::load_all(&config, &groups, &usage, TrimPolicy::Keep)
                .err()
                .unwrap();
            assert!(matches!(err, AccountingError::UsageLoad { .. }));
        }
    }
}
