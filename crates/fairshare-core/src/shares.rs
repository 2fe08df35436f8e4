//! Share calculation
//!
//! Tree percentages flow top-down from the root's 1.0, split among siblings
//! in proportion to their shares. Tree usage flows bottom-up. Both must be
//! recomputed after anything changes usage or the tree.

use tracing::trace;

use crate::{EntityId, FairshareTree};

/// Recompute percentages, tree usage and usage factors for the whole tree
pub fn recompute(tree: &mut FairshareTree) {
    compute_percentages(tree);
    compute_usage_factors(tree);
}

/// Assign every entity its fraction of the whole tree, the root being 1.0
pub fn compute_percentages(tree: &mut FairshareTree) {
    let root = tree.root();
    compute_subtree_percentages(tree, root, 1.0);
}

/// Give `node` the percentage `percentage` and split it among its
/// descendants by shares. Children whose sibling shares sum to zero get 0.
pub fn compute_subtree_percentages(tree: &mut FairshareTree, node: EntityId, percentage: f64) {
    tree.get_mut(node).tree_percentage = percentage;

    let mut pending = vec![node];
    while let Some(parent) = pending.pop() {
        let entities = &mut tree.entities;
        let parent_pct = entities[parent.index()].tree_percentage;
        let total: u64 = entities[parent.index()]
            .children()
            .iter()
            .map(|c| u64::from(entities[c.index()].shares()))
            .sum();

        for i in 0..entities[parent.index()].children().len() {
            let child = entities[parent.index()].children()[i];
            let shares = entities[child.index()].shares();
            entities[child.index()].tree_percentage = if total == 0 {
                0.0
            } else {
                parent_pct * f64::from(shares) / total as f64
            };
            pending.push(child);
        }
    }
}

/// Aggregate tree usage bottom-up and derive each usage factor
pub fn compute_usage_factors(tree: &mut FairshareTree) {
    let entities = &mut tree.entities;

    // Children always sit after their parent in the arena.
    for idx in (0..entities.len()).rev() {
        let child_usage: f64 = entities[idx]
            .children()
            .iter()
            .map(|c| entities[c.index()].tree_usage)
            .sum();
        let entity = &mut entities[idx];
        entity.tree_usage = entity.usage + child_usage;
        entity.usage_factor = usage_factor(entity.tree_usage, entity.tree_percentage);
    }

    trace!(entities = entities.len(), "Usage factors recomputed");
}

/// Usage normalized by entitlement; undefined without entitlement
pub fn usage_factor(usage: f64, tree_percentage: f64) -> Option<f64> {
    (tree_percentage > 0.0).then(|| usage / tree_percentage)
}
