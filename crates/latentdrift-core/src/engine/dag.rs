//! Directed acyclic dependency graph over model variables.
//!
//! Each variable owns an ordered, duplicate-free parent set. Edges read
//! "parent distributionally influences child". Structural checks that depend
//! on the estimator families (finite children may only have finite parents,
//! hidden variables must be roots) run in [`Dag::validate`] before learning.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::engine::errors::LearnError;
use crate::engine::variables::{VariableId, Variables};

/// Ordered parents of one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSet {
    child: VariableId,
    parents: SmallVec<[VariableId; 4]>,
}

impl ParentSet {
    fn new(child: VariableId) -> Self {
        Self {
            child,
            parents: SmallVec::new(),
        }
    }

    pub fn child(&self) -> VariableId {
        self.child
    }

    pub fn parents(&self) -> &[VariableId] {
        &self.parents
    }

    pub fn contains(&self, parent: VariableId) -> bool {
        self.parents.contains(&parent)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// The dependency graph of a model.
#[derive(Debug, Clone)]
pub struct Dag {
    variables: Arc<Variables>,
    parent_sets: Vec<ParentSet>,
}

impl Dag {
    /// Creates an edgeless graph over `variables`.
    pub fn new(variables: Arc<Variables>) -> Self {
        let parent_sets = variables.iter().map(|var| ParentSet::new(var.id())).collect();
        Self {
            variables,
            parent_sets,
        }
    }

    pub fn variables(&self) -> &Arc<Variables> {
        &self.variables
    }

    pub fn parent_set(&self, child: VariableId) -> Option<&ParentSet> {
        self.parent_sets.get(child.index())
    }

    pub fn parent_sets(&self) -> &[ParentSet] {
        &self.parent_sets
    }

    /// Adds `parent -> child`. Re-adding an existing parent is a no-op.
    pub fn add_parent(&mut self, child: VariableId, parent: VariableId) -> Result<(), LearnError> {
        if child == parent {
            return Err(LearnError::Configuration(format!(
                "variable '{}' cannot be its own parent",
                self.name_of(child)
            )));
        }
        if self.variables.get(parent).is_none() {
            return Err(LearnError::Internal(format!(
                "unknown parent variable {:?}",
                parent
            )));
        }
        let set = self.parent_sets.get_mut(child.index()).ok_or_else(|| {
            LearnError::Internal(format!("unknown child variable {:?}", child))
        })?;
        if !set.parents.contains(&parent) {
            set.parents.push(parent);
        }
        Ok(())
    }

    /// All edges as `(parent, child)` pairs, ordered by child then parent position.
    pub fn edges(&self) -> Vec<(VariableId, VariableId)> {
        self.parent_sets
            .iter()
            .flat_map(|set| set.parents.iter().map(move |&p| (p, set.child)))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.parent_sets.iter().map(ParentSet::len).sum()
    }

    /// Variables that list `parent` among their parents.
    pub fn children_of(&self, parent: VariableId) -> Vec<VariableId> {
        self.parent_sets
            .iter()
            .filter(|set| set.contains(parent))
            .map(|set| set.child)
            .collect()
    }

    /// Kahn ordering; `None` when the graph contains a cycle.
    pub fn topological_order(&self) -> Option<Vec<VariableId>> {
        let n = self.parent_sets.len();
        let mut in_degree: Vec<usize> = self.parent_sets.iter().map(ParentSet::len).collect();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        for set in &self.parent_sets {
            for parent in &set.parents {
                children[parent.index()].push(set.child.index());
            }
        }

        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).rev().collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = ready.pop() {
            order.push(VariableId(idx as u32));
            for &child in children[idx].iter().rev() {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(child);
                }
            }
        }
        (order.len() == n).then_some(order)
    }

    pub fn contains_cycle(&self) -> bool {
        self.topological_order().is_none()
    }

    /// Checks acyclicity and the parent-type constraints of the estimators.
    pub fn validate(&self) -> Result<(), LearnError> {
        if self.contains_cycle() {
            return Err(LearnError::Configuration(
                "dependency graph contains a cycle".into(),
            ));
        }
        for set in &self.parent_sets {
            let child = self
                .variables
                .get(set.child)
                .ok_or_else(|| LearnError::Internal(format!("unknown variable {:?}", set.child)))?;
            if child.is_hidden() && !set.is_empty() {
                return Err(LearnError::Configuration(format!(
                    "hidden variable '{}' must be a root of the graph",
                    child.name()
                )));
            }
            if child.state_space().is_real() {
                continue;
            }
            for parent in set.parents() {
                let parent_var = self.variables.get(*parent).ok_or_else(|| {
                    LearnError::Internal(format!("unknown variable {:?}", parent))
                })?;
                if parent_var.state_space().is_real() {
                    return Err(LearnError::Configuration(format!(
                        "finite-state variable '{}' cannot have the real-valued parent '{}'",
                        child.name(),
                        parent_var.name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn name_of(&self, id: VariableId) -> &str {
        self.variables.get(id).map_or("?", |var| var.name())
    }
}
