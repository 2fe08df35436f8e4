//! Entity name rules

use thiserror::Error;

/// Name of the synthetic root of every fairshare tree
pub const ROOT_NAME: &str = "root";

/// Name of the group that holds entitlement for entities missing from the group file
pub const UNKNOWN_NAME: &str = "unknown";

/// Group id given to the unknown group
pub const UNKNOWN_GROUP_ID: i64 = -1;

/// True for names the tree creates itself and the group file may not declare
pub fn is_reserved_name(name: &str) -> bool {
    name == ROOT_NAME || name == UNKNOWN_NAME
}

/// Longest entity name accepted, in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Reasons an entity name is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("entity name is empty")]
    Empty,

    #[error("entity name '{0}' contains whitespace or '#'")]
    InvalidCharacter(String),

    #[error("entity name is longer than {MAX_NAME_LEN} bytes")]
    TooLong,
}

/// Check that `name` can be used as an entity name.
///
/// Names appear as whitespace-separated fields in the group file and as
/// keys in the usage database, so they may not contain whitespace or the
/// comment character.
pub fn validate_entity_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if name.chars().any(|c| c.is_whitespace() || c == '#') {
        return Err(NameError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}
