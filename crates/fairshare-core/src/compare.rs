//! Fairshare priority between two entities
//!
//! Entities are ranked by walking both root-first paths together. At the
//! first level where the paths part, the two nodes found there are ranked by
//! usage factor: the lower factor has been under-served and sorts first.
//! When one entity is an ancestor of the other there is no such level, and
//! the two entities' own factors are compared instead.

use std::cmp::Ordering;

use crate::{EntityId, FairshareTree};

/// Rank `a` against `b`. `Less` means `a` has the higher priority.
pub fn compare(tree: &FairshareTree, a: EntityId, b: EntityId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let path_a = tree.path(a);
    let path_b = tree.path(b);

    let (left, right) = path_a
        .iter()
        .zip(&path_b)
        .find(|(x, y)| x != y)
        .map(|(&x, &y)| (x, y))
        // one path is a prefix of the other
        .unwrap_or((a, b));

    compare_factors(
        tree.get(left).usage_factor(),
        tree.get(right).usage_factor(),
    )
}

/// Order two usage factors, lower first.
///
/// An undefined factor sorts after every defined one; two undefined factors
/// are equal.
pub fn compare_factors(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
