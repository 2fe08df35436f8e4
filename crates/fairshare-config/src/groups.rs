//! Group membership file parsing
//!
//! One declaration per line:
//!
//! ```text
//! # name     group-id   parent   shares
//! physics    10         root     60
//! alice      11         physics  10
//! ```
//!
//! Fields are whitespace-separated, `#` starts a comment and blank lines are
//! skipped. The parent may be declared later in the file.

use fairshare_util::{NameError, validate_entity_name};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A single `name group-id parent shares` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDecl {
    pub name: String,
    pub group_id: i64,
    pub parent: String,
    pub shares: u32,
    /// 1-based line number in the source file
    pub line: usize,
}

/// Group file errors
#[derive(Debug, Error)]
pub enum GroupFileError {
    #[error("Failed to read group file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("line {line}: {source}")]
    InvalidName {
        line: usize,
        #[source]
        source: NameError,
    },
}

/// Read and parse a group membership file
pub fn load_groups(path: impl AsRef<Path>) -> Result<Vec<GroupDecl>, GroupFileError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| GroupFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let decls = parse_groups(&content)?;
    debug!(path = %path.display(), declarations = decls.len(), "Group file loaded");
    Ok(decls)
}

/// Parse group membership declarations, stopping at the first bad line
pub fn parse_groups(content: &str) -> Result<Vec<GroupDecl>, GroupFileError> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let text = raw.split('#').next().unwrap_or_default().trim();
            (!text.is_empty()).then(|| parse_line(text, idx + 1))
        })
        .collect()
}

fn parse_line(text: &str, line: usize) -> Result<GroupDecl, GroupFileError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let [name, group_id, parent, shares] = fields[..] else {
        return Err(GroupFileError::Malformed {
            line,
            message: format!(
                "expected 4 fields (name group-id parent shares), found {}",
                fields.len()
            ),
        });
    };

    validate_entity_name(name).map_err(|source| GroupFileError::InvalidName { line, source })?;
    validate_entity_name(parent)
        .map_err(|source| GroupFileError::InvalidName { line, source })?;

    let group_id = group_id.parse().map_err(|_| GroupFileError::Malformed {
        line,
        message: format!("entity '{name}': invalid group id '{group_id}'"),
    })?;
    let shares = shares.parse().map_err(|_| GroupFileError::Malformed {
        line,
        message: format!("entity '{name}': invalid shares '{shares}'"),
    })?;

    Ok(GroupDecl {
        name: name.to_string(),
        group_id,
        parent: parent.to_string(),
        shares,
        line,
    })
}
