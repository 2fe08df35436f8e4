//! Fairshare entity tree
//!
//! Entities live in an arena indexed by [`EntityId`]. The arena is filled
//! breadth-first from the root, so a parent always has a smaller index than
//! its children; the share calculator relies on that ordering.
//!
//! Every tree has two entities of its own: `root` and the `unknown` group,
//! which is root's first child and holds the entitlement reserved for
//! entities missing from the group file.

use fairshare_config::GroupDecl;
use fairshare_util::{ROOT_NAME, UNKNOWN_GROUP_ID, UNKNOWN_NAME, is_reserved_name};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::debug;

/// Index of an entity within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A user or group node of the fairshare tree
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    group_id: i64,
    parent_group_id: i64,
    shares: u32,
    depth: usize,
    parent: Option<EntityId>,
    children: Vec<EntityId>,

    pub(crate) usage: f64,
    pub(crate) tree_usage: f64,
    pub(crate) tree_percentage: f64,
    pub(crate) usage_factor: Option<f64>,
}

impl Entity {
    fn new(name: &str, group_id: i64, parent_group_id: i64, shares: u32, depth: usize) -> Self {
        Self {
            name: name.to_string(),
            group_id,
            parent_group_id,
            shares,
            depth,
            parent: None,
            children: Vec::new(),
            usage: 0.0,
            tree_usage: 0.0,
            tree_percentage: 0.0,
            usage_factor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own group id as declared (`cresgroup`)
    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    /// Group id of the parent (`resgroup`)
    pub fn parent_group_id(&self) -> i64 {
        self.parent_group_id
    }

    pub fn shares(&self) -> u32 {
        self.shares
    }

    /// Distance from the root; the root is 0
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in declaration order
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Usage recorded against this entity alone
    pub fn usage(&self) -> f64 {
        self.usage
    }

    /// Own usage plus the tree usage of every child
    pub fn tree_usage(&self) -> f64 {
        self.tree_usage
    }

    /// Fraction of the whole tree this entity is entitled to
    pub fn tree_percentage(&self) -> f64 {
        self.tree_percentage
    }

    /// Tree usage divided by tree percentage; `None` without entitlement
    pub fn usage_factor(&self) -> Option<f64> {
        self.usage_factor
    }
}

/// Errors in the shape of the declared tree
#[derive(Debug, Clone, Error)]
pub enum TreeError {
    #[error("line {line}: entity '{name}' is declared more than once")]
    DuplicateEntity { name: String, line: usize },

    #[error("line {line}: entity '{name}' names unknown parent '{parent}'")]
    UnknownParent {
        name: String,
        parent: String,
        line: usize,
    },

    #[error("line {line}: entity '{name}' is in a parent cycle ({})", cycle.join(" -> "))]
    Cycle {
        name: String,
        line: usize,
        cycle: Vec<String>,
    },
}

/// The entity tree plus its name index
#[derive(Debug, Clone)]
pub struct FairshareTree {
    pub(crate) entities: Vec<Entity>,
    index: HashMap<String, EntityId>,
}

impl FairshareTree {
    /// A tree holding only the root and the unknown group
    pub fn empty(unknown_shares: u32) -> Self {
        let mut root = Entity::new(ROOT_NAME, 0, 0, 1, 0);
        root.tree_percentage = 1.0;
        let mut tree = Self {
            entities: vec![root],
            index: HashMap::from([(ROOT_NAME.to_string(), EntityId(0))]),
        };
        tree.push_child(EntityId(0), UNKNOWN_NAME, UNKNOWN_GROUP_ID, unknown_shares);
        tree
    }

    /// Build a tree from group declarations.
    ///
    /// Parents may be declared after their children. Siblings keep the order
    /// in which they were declared. `unknown_shares` sizes the unknown group.
    pub fn build(decls: &[GroupDecl], unknown_shares: u32) -> Result<Self, TreeError> {
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(decls.len());
        for (idx, decl) in decls.iter().enumerate() {
            if is_reserved_name(&decl.name) || by_name.insert(&decl.name, idx).is_some() {
                return Err(TreeError::DuplicateEntity {
                    name: decl.name.clone(),
                    line: decl.line,
                });
            }
        }

        // None is the root
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(decls.len());
        for decl in decls {
            if decl.parent == ROOT_NAME {
                parents.push(None);
                continue;
            }
            match by_name.get(decl.parent.as_str()) {
                Some(&parent) => parents.push(Some(parent)),
                None => {
                    return Err(TreeError::UnknownParent {
                        name: decl.name.clone(),
                        parent: decl.parent.clone(),
                        line: decl.line,
                    });
                }
            }
        }

        check_cycles(decls, &parents)?;

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); decls.len()];
        let mut root_children = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(idx),
                None => root_children.push(idx),
            }
        }

        let mut tree = Self::empty(unknown_shares);
        tree.entities.reserve(decls.len());
        tree.index.reserve(decls.len());

        let mut queue: VecDeque<(EntityId, &[usize])> = VecDeque::new();
        queue.push_back((EntityId(0), root_children.as_slice()));
        while let Some((parent_id, kids)) = queue.pop_front() {
            for &decl_idx in kids {
                let decl = &decls[decl_idx];
                let id = tree.push_child(parent_id, &decl.name, decl.group_id, decl.shares);
                queue.push_back((id, children[decl_idx].as_slice()));
            }
        }

        debug!(entities = tree.len(), "Fairshare tree built");
        Ok(tree)
    }

    fn push_child(&mut self, parent: EntityId, name: &str, group_id: i64, shares: u32) -> EntityId {
        let id = EntityId(self.entities.len());
        let (parent_group_id, depth) = {
            let p = &self.entities[parent.0];
            (p.group_id, p.depth + 1)
        };

        let mut entity = Entity::new(name, group_id, parent_group_id, shares, depth);
        entity.parent = Some(parent);
        self.entities.push(entity);
        self.entities[parent.0].children.push(id);
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn unknown(&self) -> EntityId {
        EntityId(1)
    }

    pub fn root(&self) -> EntityId {
        EntityId(0)
    }

    /// Number of entities, including the root
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Always false: the root and the unknown group are always present
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.find(name).map(|id| self.get(id))
    }

    /// Every entity, parents before children
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(idx, entity)| (EntityId(idx), entity))
    }

    /// Ancestors of `id` from the root down to `id` itself
    pub fn path(&self, id: EntityId) -> Vec<EntityId> {
        let mut path = Vec::with_capacity(self.get(id).depth + 1);
        let mut current = Some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.get(node).parent;
        }
        path.reverse();
        path
    }

    /// Depth-first order, children in declaration order
    pub fn preorder(&self) -> Vec<EntityId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(id).children.iter().rev());
        }
        order
    }
}

/// Every parent chain must end at the root
fn check_cycles(decls: &[GroupDecl], parents: &[Option<usize>]) -> Result<(), TreeError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; decls.len()];
    for start in 0..decls.len() {
        let mut chain: Vec<usize> = Vec::new();
        let mut current = Some(start);

        while let Some(node) = current {
            match marks[node] {
                Mark::Done => break,
                Mark::InProgress => {
                    let from = chain.iter().position(|&n| n == node).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        chain[from..].iter().map(|&n| decls[n].name.clone()).collect();
                    cycle.push(decls[node].name.clone());
                    return Err(TreeError::Cycle {
                        name: decls[node].name.clone(),
                        line: decls[node].line,
                        cycle,
                    });
                }
                Mark::Unvisited => {
                    marks[node] = Mark::InProgress;
                    chain.push(node);
                    current = parents[node];
                }
            }
        }

        for node in chain {
            marks[node] = Mark::Done;
        }
    }
    Ok(())
}
