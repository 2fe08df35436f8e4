//! Default paths for fairshare components
//!
//! Paths are user-writable by default (no root required):
//! - Settings: `$XDG_CONFIG_HOME/fairshare/fairshare.toml` or `~/.config/fairshare/fairshare.toml`
//! - Data: `$XDG_DATA_HOME/fairshare` or `~/.local/share/fairshare`

use std::path::{Path, PathBuf};

/// Environment variable for overriding the data directory
pub const FAIRSHARE_HOME_ENV: &str = "FAIRSHARE_HOME";

/// Environment variable for overriding the settings file path
pub const FAIRSHARE_CONFIG_ENV: &str = "FAIRSHARE_CONFIG";

/// Settings filename within the config directory
const CONFIG_FILENAME: &str = "fairshare.toml";

/// Application subdirectory name
const APP_DIR: &str = "fairshare";

/// Get the default settings file path.
///
/// Order of precedence:
/// 1. `$FAIRSHARE_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/fairshare/fairshare.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/fairshare/fairshare.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(FAIRSHARE_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$FAIRSHARE_HOME` environment variable (if set)
/// 2. `$XDG_DATA_HOME/fairshare` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/fairshare` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(FAIRSHARE_HOME_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the FAIRSHARE_HOME env var.
/// Used for default values in settings where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Append a suffix to the final component of `path` (`usage` -> `usage.bak`)
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_contains_fairshare() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("fairshare"));
    }

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let base = Path::new("/var/spool/fairshare");
        assert_eq!(
            resolve_in(base, Path::new("usage")),
            PathBuf::from("/var/spool/fairshare/usage")
        );
        assert_eq!(
            resolve_in(base, Path::new("/srv/usage")),
            PathBuf::from("/srv/usage")
        );
    }

    #[test]
    fn test_suffix_is_appended_not_substituted() {
        assert_eq!(
            with_suffix(Path::new("/data/usage.db"), ".bak"),
            PathBuf::from("/data/usage.db.bak")
        );
    }
}
