//! Human-readable output

use fairshare_core::{EntityDetail, EntityView};
use std::fmt::Write;

/// Usage factor for display; entities without entitlement show a dash
pub fn format_factor(factor: Option<f64>) -> String {
    match factor {
        Some(f) => format!("{f:.4}"),
        None => "-".to_string(),
    }
}

fn format_percentage(fraction: f64) -> String {
    format!("{:.4}%", fraction * 100.0)
}

/// One entity with the levels above it
pub fn detail(detail: &EntityDetail, unit: &str) -> String {
    let e = &detail.entity;
    let mut out = String::new();
    let _ = writeln!(out, "fairshare entity: {}", e.name);
    let _ = writeln!(out, "group id:         {}", e.group_id);
    let _ = writeln!(out, "parent group id:  {}", e.parent_group_id);
    let _ = writeln!(out, "shares:           {}", e.shares);
    let _ = writeln!(out, "percentage:       {}", format_percentage(e.tree_percentage));
    let _ = writeln!(out, "usage:            {} ({unit})", e.usage);
    let _ = writeln!(out, "tree usage:       {}", e.tree_usage);
    let _ = writeln!(out, "usage factor:     {}", format_factor(e.usage_factor));
    let _ = writeln!(out, "path from root:");
    for level in &detail.path {
        let _ = writeln!(
            out,
            "  {:<16} {:>8} {:>14} / {:<10.6} = {}",
            level.name,
            level.group_id,
            level.tree_usage,
            level.tree_percentage,
            format_factor(level.usage_factor)
        );
    }
    out
}

/// One line per entity
pub fn flat(views: &[EntityView]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:>8} {:>8} {:>8} {:>14} {:>12} {:>14}",
        "NAME", "GROUP", "PARENT", "SHARES", "USAGE", "PERCENTAGE", "FACTOR"
    );
    for v in views {
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>8} {:>8} {:>14} {:>12} {:>14}",
            v.name,
            v.group_id,
            v.parent_group_id,
            v.shares,
            v.usage,
            format_percentage(v.tree_percentage),
            format_factor(v.usage_factor)
        );
    }
    out
}

/// Indented hierarchy; `views` must be in depth-first order
pub fn tree(views: &[EntityView]) -> String {
    let mut out = String::new();
    for v in views {
        let _ = writeln!(
            out,
            "{}{} ({}) shares={} usage={} tree_usage={} percentage={} factor={}",
            "  ".repeat(v.depth),
            v.name,
            v.group_id,
            v.shares,
            v.usage,
            v.tree_usage,
            format_percentage(v.tree_percentage),
            format_factor(v.usage_factor)
        );
    }
    out
}
