//! Settings validation

use crate::schema::RawConfig;
use std::path::Path;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("decay_factor {0} must be greater than 0 and less than 1")]
    InvalidDecayFactor(f64),

    #[error("min_usage {0} must be a finite, non-negative number")]
    InvalidMinUsage(f64),

    #[error("decay_interval_seconds must be greater than 0")]
    ZeroDecayInterval,

    #[error("usage_unit cannot be empty")]
    EmptyUsageUnit,

    #[error("paths.{field} cannot be empty")]
    EmptyPath { field: &'static str },

    #[error("paths.{first} and paths.{second} point at the same file")]
    ConflictingPaths {
        first: &'static str,
        second: &'static str,
    },
}

/// Validate raw settings, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let fs = &config.fairshare;

    if let Some(factor) = fs.decay_factor
        && !is_valid_decay_factor(factor)
    {
        errors.push(ValidationError::InvalidDecayFactor(factor));
    }

    if let Some(min) = fs.min_usage
        && !(min.is_finite() && min >= 0.0)
    {
        errors.push(ValidationError::InvalidMinUsage(min));
    }

    if fs.decay_interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroDecayInterval);
    }

    if let Some(unit) = &fs.usage_unit
        && unit.trim().is_empty()
    {
        errors.push(ValidationError::EmptyUsageUnit);
    }

    errors.extend(validate_paths(config));

    errors
}

fn validate_paths(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let paths = &config.paths;

    let files = [
        ("group_file", paths.group_file.as_deref()),
        ("usage_file", paths.usage_file.as_deref()),
        ("touch_file", paths.touch_file.as_deref()),
    ];

    for (field, path) in files {
        if path.is_some_and(|p| p.as_os_str().is_empty()) {
            errors.push(ValidationError::EmptyPath { field });
        }
    }
    if paths
        .data_dir
        .as_deref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        errors.push(ValidationError::EmptyPath { field: "data_dir" });
    }

    // Compared as written; both default to distinct names when unset.
    let usage = paths.usage_file.as_deref().unwrap_or(Path::new("usage"));
    let touch = paths
        .touch_file
        .as_deref()
        .unwrap_or(Path::new("usage.touch"));
    if usage == touch {
        errors.push(ValidationError::ConflictingPaths {
            first: "usage_file",
            second: "touch_file",
        });
    }

    errors
}

/// Decay factors must shrink usage without erasing it
pub fn is_valid_decay_factor(factor: f64) -> bool {
    factor.is_finite() && factor > 0.0 && factor < 1.0
}
