//! Raw settings schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw settings as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Accounting behaviour
    #[serde(default)]
    pub fairshare: RawFairshareConfig,

    /// File locations
    #[serde(default)]
    pub paths: RawPathsConfig,
}

/// Accounting settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFairshareConfig {
    /// Label of the resource usage is measured in (default: cput)
    pub usage_unit: Option<String>,

    /// Multiplier applied to every usage value on decay, in (0, 1)
    pub decay_factor: Option<f64>,

    /// How often the scheduler is expected to decay, in seconds
    pub decay_interval_seconds: Option<u64>,

    /// Positive usage never decays below this value
    pub min_usage: Option<f64>,

    /// Shares of the built-in group for entities missing from the group file
    pub unknown_shares: Option<u32>,

    /// Drop usage records for unknown entities when loading
    pub trim_on_load: Option<bool>,
}

/// File locations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPathsConfig {
    /// Base directory for relative paths
    pub data_dir: Option<PathBuf>,

    /// Group membership file (default: resource_group)
    pub group_file: Option<PathBuf>,

    /// Usage database (default: usage)
    pub usage_file: Option<PathBuf>,

    /// Marker file touched after every write (default: usage.touch)
    pub touch_file: Option<PathBuf>,

    /// Hold an advisory lock on the usage database for the whole session
    pub lock: Option<bool>,
}
