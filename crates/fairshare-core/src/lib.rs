//! Fairshare accounting engine
//!
//! This crate is the heart of the fairshare tooling, containing:
//! - The entity tree built from group membership declarations
//! - Share calculation (tree percentages, tree usage, usage factors)
//! - Usage decay
//! - Priority comparison between arbitrary entities
//! - The [`Accounting`] session that owns the tree and persists every change

mod accounting;
mod compare;
mod decay;
mod error;
mod report;
mod shares;
mod tree;

pub use accounting::*;
pub use compare::*;
pub use decay::*;
pub use error::*;
pub use report::*;
pub use shares::*;
pub use tree::*;
