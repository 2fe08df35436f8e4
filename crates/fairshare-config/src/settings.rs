//! Validated settings structures

use crate::schema::{RawConfig, RawFairshareConfig, RawPathsConfig};
use crate::validation::is_valid_decay_factor;
use fairshare_util::{default_data_dir, resolve_in};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Validated settings ready for use by the accounting engine
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub fairshare: FairshareSettings,
    pub paths: PathSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            fairshare: FairshareSettings::from_raw(raw.fairshare),
            paths: PathSettings::from_raw(raw.paths),
        }
    }
}

/// A decay multiplier known to lie strictly between 0 and 1
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct DecayFactor(f64);

impl DecayFactor {
    pub const DEFAULT: DecayFactor = DecayFactor(0.5);

    /// Returns `None` unless `0 < factor < 1`
    pub fn new(factor: f64) -> Option<Self> {
        is_valid_decay_factor(factor).then_some(Self(factor))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for DecayFactor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Accounting behaviour
#[derive(Debug, Clone)]
pub struct FairshareSettings {
    pub usage_unit: String,
    pub decay_factor: DecayFactor,
    /// Informational: how often the scheduler runs a decay
    pub decay_interval: Duration,
    /// Positive usage is never decayed below this. 0 disables the floor.
    pub min_usage: f64,
    pub unknown_shares: u32,
    pub trim_on_load: bool,
}

impl FairshareSettings {
    fn from_raw(raw: RawFairshareConfig) -> Self {
        let defaults = Self::default();
        Self {
            usage_unit: raw.usage_unit.unwrap_or(defaults.usage_unit),
            decay_factor: raw
                .decay_factor
                .and_then(DecayFactor::new)
                .unwrap_or(defaults.decay_factor),
            decay_interval: raw
                .decay_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.decay_interval),
            min_usage: raw.min_usage.unwrap_or(defaults.min_usage),
            unknown_shares: raw.unknown_shares.unwrap_or(defaults.unknown_shares),
            trim_on_load: raw.trim_on_load.unwrap_or(defaults.trim_on_load),
        }
    }
}

impl Default for FairshareSettings {
    fn default() -> Self {
        Self {
            usage_unit: "cput".into(),
            decay_factor: DecayFactor::DEFAULT,
            decay_interval: Duration::from_secs(24 * 60 * 60),
            min_usage: 0.0,
            unknown_shares: 0,
            trim_on_load: false,
        }
    }
}

/// File locations. Relative file paths are resolved against `data_dir`.
#[derive(Debug, Clone)]
pub struct PathSettings {
    pub data_dir: PathBuf,
    pub group_file: PathBuf,
    pub usage_file: PathBuf,
    pub touch_file: PathBuf,
    pub lock: bool,
}

impl PathSettings {
    fn from_raw(raw: RawPathsConfig) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            group_file: raw.group_file.unwrap_or(defaults.group_file),
            usage_file: raw.usage_file.unwrap_or(defaults.usage_file),
            touch_file: raw.touch_file.unwrap_or(defaults.touch_file),
            lock: raw.lock.unwrap_or(defaults.lock),
        }
    }

    pub fn group_path(&self) -> PathBuf {
        resolve_in(&self.data_dir, &self.group_file)
    }

    pub fn usage_path(&self) -> PathBuf {
        resolve_in(&self.data_dir, &self.usage_file)
    }

    pub fn touch_path(&self) -> PathBuf {
        resolve_in(&self.data_dir, &self.touch_file)
    }

    /// Replace the base directory, keeping relative file names
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            group_file: PathBuf::from("resource_group"),
            usage_file: PathBuf::from("usage"),
            touch_file: PathBuf::from("usage.touch"),
            lock: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_factor_bounds() {
        assert!(DecayFactor::new(0.5).is_some());
        assert!(DecayFactor::new(0.0).is_none());
        assert!(DecayFactor::new(1.0).is_none());
        assert_eq!(DecayFactor::default().get(), 0.5);
    }

    #[test]
    fn test_data_dir_override_keeps_file_names() {
        let paths = PathSettings::default().with_data_dir("/tmp/fs-test");
        assert_eq!(paths.usage_path(), PathBuf::from("/tmp/fs-test/usage"));
        assert_eq!(
            paths.group_path(),
            PathBuf::from("/tmp/fs-test/resource_group")
        );
        assert_eq!(
            paths.touch_path(),
            PathBuf::from("/tmp/fs-test/usage.touch")
        );
    }
}
