//! Error types for accounting sessions

use fairshare_config::{ConfigError, GroupFileError};
use fairshare_store::StoreError;
use thiserror::Error;

use crate::TreeError;

/// Errors surfaced by [`crate::Accounting`]
///
/// The first four variants identify which load stage failed and abort the
/// session. `NotFound` and `InvalidUsage` concern a single entity and leave
/// the session usable.
#[derive(Debug, Error)]
pub enum AccountingError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Group file error: {0}")]
    GroupParse(#[from] GroupFileError),

    #[error("Invalid fairshare tree: {0}")]
    Tree(#[from] TreeError),

    #[error("Failed to load usage database {location}: {source}")]
    UsageLoad {
        location: String,
        #[source]
        source: StoreError,
    },

    #[error("Fairshare entity {0} does not exist")]
    NotFound(String),

    #[error("Invalid usage {value} for {name}: usage must be finite and non-negative")]
    InvalidUsage { name: String, value: f64 },

    #[error("Failed to save usage database {location}: {source}")]
    Persistence {
        location: String,
        #[source]
        source: StoreError,
    },
}

impl AccountingError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// True for errors that only concern one entity
    pub fn is_per_entity(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidUsage { .. })
    }
}

pub type AccountingResult<T> = Result<T, AccountingError>;
