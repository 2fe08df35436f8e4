//! Usage database format
//!
//! A header line followed by one record per line, each a JSON object:
//!
//! ```text
//! {"format":"fairshare-usage","version":1}
//! {"name":"alice","usage":100.0}
//! ```
//!
//! Records are written sorted by name so re-encoding a decoded database
//! reproduces it byte for byte.

use fairshare_util::validate_entity_name;
use serde::{Deserialize, Serialize};

use crate::{StoreError, StoreResult, UsageRecords};

/// Value of the header's `format` field
pub const USAGE_FORMAT: &str = "fairshare-usage";

/// Current layout version
pub const USAGE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: String,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    name: String,
    usage: f64,
}

/// A record line that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

/// Result of decoding a usage database
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub records: UsageRecords,
    /// Lines skipped because they were unparseable, invalid or duplicated
    pub rejected: Vec<RejectedRecord>,
}

/// Serialize records into the on-disk layout
pub fn encode_records(records: &UsageRecords) -> StoreResult<String> {
    let header = Header {
        format: USAGE_FORMAT.to_string(),
        version: USAGE_VERSION,
    };

    let mut out = serde_json::to_string(&header)?;
    out.push('\n');
    for (name, usage) in records.iter() {
        if !usage.is_finite() {
            return Err(StoreError::Serialization(format!(
                "usage for '{name}' is not finite"
            )));
        }
        let record = Record {
            name: name.to_string(),
            usage,
        };
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parse the on-disk layout.
///
/// Only a bad header fails the whole database. Individual records that do
/// not parse are returned in [`Decoded::rejected`] and otherwise ignored.
/// Empty content decodes to an empty database.
pub fn decode_records(content: &str) -> StoreResult<Decoded> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return Ok(Decoded::default());
    };

    let header: Header = serde_json::from_str(header_line)
        .map_err(|e| StoreError::BadHeader(e.to_string()))?;
    if header.format != USAGE_FORMAT {
        return Err(StoreError::BadHeader(format!(
            "unexpected format '{}'",
            header.format
        )));
    }
    if header.version != USAGE_VERSION {
        return Err(StoreError::UnsupportedVersion(header.version));
    }

    let mut decoded = Decoded::default();
    for (idx, line) in lines {
        let line_no = idx + 1;
        match parse_record(line) {
            Ok(record) if decoded.records.contains(&record.name) => {
                decoded.rejected.push(RejectedRecord {
                    line: line_no,
                    reason: format!("duplicate record for '{}'", record.name),
                });
            }
            Ok(record) => {
                decoded.records.insert(record.name, record.usage);
            }
            Err(reason) => decoded.rejected.push(RejectedRecord {
                line: line_no,
                reason,
            }),
        }
    }

    Ok(decoded)
}

fn parse_record(line: &str) -> Result<Record, String> {
    let record: Record = serde_json::from_str(line).map_err(|e| e.to_string())?;
    validate_entity_name(&record.name).map_err(|e| e.to_string())?;
    if !(record.usage.is_finite() && record.usage >= 0.0) {
        return Err(format!(
            "usage {} for '{}' is negative",
            record.usage, record.name
        ));
    }
    Ok(record)
}
