//! Shared utilities for fairshare
//!
//! This crate provides:
//! - Entity name validation shared by the group file parser and the usage database
//! - Default paths for the settings file and the fairshare data directory

mod names;
mod paths;

pub use names::*;
pub use paths::*;
