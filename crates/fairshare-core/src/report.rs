//! Read-only views of the tree for printing and JSON output

use serde::Serialize;

use crate::{Entity, EntityId, FairshareTree};

/// Snapshot of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub name: String,
    pub group_id: i64,
    pub parent_group_id: i64,
    pub is_group: bool,
    pub shares: u32,
    pub usage: f64,
    pub tree_usage: f64,
    pub tree_percentage: f64,
    /// Absent when the entity has no entitlement
    pub usage_factor: Option<f64>,
    pub depth: usize,
}

impl EntityView {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            name: entity.name().to_string(),
            group_id: entity.group_id(),
            parent_group_id: entity.parent_group_id(),
            is_group: entity.is_group(),
            shares: entity.shares(),
            usage: entity.usage(),
            tree_usage: entity.tree_usage(),
            tree_percentage: entity.tree_percentage(),
            usage_factor: entity.usage_factor(),
            depth: entity.depth(),
        }
    }
}

/// An entity together with every level above it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    #[serde(flatten)]
    pub entity: EntityView,
    /// Root first, ending with the entity itself
    pub path: Vec<EntityView>,
}

/// Every entity in depth-first order, root first
pub fn flat_report(tree: &FairshareTree) -> Vec<EntityView> {
    tree.preorder()
        .into_iter()
        .map(|id| EntityView::from_entity(tree.get(id)))
        .collect()
}

pub fn entity_detail(tree: &FairshareTree, id: EntityId) -> EntityDetail {
    EntityDetail {
        entity: EntityView::from_entity(tree.get(id)),
        path: tree
            .path(id)
            .into_iter()
            .map(|node| EntityView::from_entity(tree.get(node)))
            .collect(),
    }
}
