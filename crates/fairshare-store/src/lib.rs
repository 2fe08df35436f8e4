//! Persistence layer for fairshare
//!
//! Provides:
//! - The versioned usage database format (one JSON record per line)
//! - A file-backed store with backup, atomic replace and a touch marker
//! - An advisory lock held across an accounting session
//! - An in-memory store for tests and embedding

mod codec;
mod file;
mod lock;
mod memory;
mod traits;

pub use codec::*;
pub use file::*;
pub use lock::*;
pub use memory::*;
pub use traits::*;

use std::path::PathBuf;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Bad usage database header: {0}")]
    BadHeader(String),

    #[error("Unsupported usage database version: {0}")]
    UnsupportedVersion(u32),

    #[error("Failed to lock {path}: {message}")]
    Lock { path: PathBuf, message: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
