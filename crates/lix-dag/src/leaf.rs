//! Leaf change detection.
//!
//! A change is a leaf for a head commit when its commit is reachable from
//! the head and no other reachable commit that descends from it touches the
//! same entity. Several leaves for one entity mean the histories diverged
//! and have not been merged.

use std::collections::{BTreeMap, HashMap, HashSet};

use lix_types::{ChangeId, CommitId, EntityKey};

use crate::graph::CommitGraph;

/// A candidate current change of an entity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeafChange {
    pub commit_id: CommitId,
    pub change_id: ChangeId,
}

/// Leaf changes per entity as seen from one head commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeafSet {
    pub leaves: BTreeMap<EntityKey, Vec<LeafChange>>,
}

impl LeafSet {
    pub fn get(&self, key: &EntityKey) -> &[LeafChange] {
        self.leaves.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Entities with more than one leaf.
    pub fn divergent(&self) -> impl Iterator<Item = (&EntityKey, &[LeafChange])> {
        self.leaves
            .iter()
            .filter(|(_, leaves)| leaves.len() > 1)
            .map(|(key, leaves)| (key, leaves.as_slice()))
    }
}

impl CommitGraph {
    /// Compute the leaf changes of every entity reachable from `head`.
    ///
    /// Walks the ancestry children-first. Each commit inherits the set of
    /// entities touched by any of its reachable descendants ("covered");
    /// an element is a leaf exactly when its entity is not covered.
    pub fn leaf_changes(&self, head: &CommitId) -> LeafSet {
        let ancestry = self.ancestors(head);
        let mut order = self.topological_order(&ancestry);
        order.reverse();

        let mut covered: HashMap<CommitId, HashSet<EntityKey>> = HashMap::new();
        let mut result = LeafSet::default();

        for commit_id in &order {
            let mut seen: HashSet<EntityKey> = HashSet::new();
            for child in self.children(commit_id) {
                if !ancestry.contains(child) {
                    continue;
                }
                if let Some(child_covered) = covered.get(child) {
                    seen.extend(child_covered.iter().cloned());
                }
                if let Some(child_commit) = self.get(child) {
                    seen.extend(
                        self.elements(&child_commit.change_set_id)
                            .map(|e| e.entity_key()),
                    );
                }
            }

            if let Some(commit) = self.get(commit_id) {
                for element in self.elements(&commit.change_set_id) {
                    let key = element.entity_key();
                    if !seen.contains(&key) {
                        result.leaves.entry(key).or_default().push(LeafChange {
                            commit_id: commit_id.clone(),
                            change_id: element.change_id.clone(),
                        });
                    }
                }
            }
            covered.insert(commit_id.clone(), seen);
        }

        for leaves in result.leaves.values_mut() {
            leaves.sort();
        }
        result
    }
}
