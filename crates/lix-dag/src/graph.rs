//! The commit graph structure and traversal algorithms.
//!
//! [`CommitGraph`] stores commits in a [`HashMap`] with parent and child
//! indexes, plus the change sets and their elements. Commit insertion order
//! is kept so exports are stable.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use lix_types::{ChangeId, ChangeSetId, CommitId, EntityKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::change_set::{ChangeSet, ChangeSetElement};
use crate::commit::{Commit, CommitEdge};
use crate::error::{DagError, DagResult};

/// Serialisable form of a [`CommitGraph`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphImage {
    pub change_sets: Vec<ChangeSet>,
    pub elements: Vec<ChangeSetElement>,
    pub commits: Vec<Commit>,
    pub edges: Vec<CommitEdge>,
}

/// Commits, commit edges, change sets and change set elements.
#[derive(Clone, Debug, Default)]
pub struct CommitGraph {
    commits: HashMap<CommitId, Commit>,
    order: Vec<CommitId>,
    parents: HashMap<CommitId, Vec<CommitId>>,
    children: HashMap<CommitId, Vec<CommitId>>,
    change_sets: BTreeMap<ChangeSetId, ChangeSet>,
    elements: BTreeMap<ChangeSetId, BTreeMap<EntityKey, ChangeSetElement>>,
    /// Change set -> commit that owns it.
    change_set_commit: HashMap<ChangeSetId, CommitId>,
    /// Change -> change sets containing it.
    change_index: HashMap<ChangeId, BTreeSet<ChangeSetId>>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    // ---------------------------------------------------------------
    // Change sets
    // ---------------------------------------------------------------

    pub fn add_change_set(&mut self, change_set: ChangeSet) -> DagResult<()> {
        if self.change_sets.contains_key(&change_set.id) {
            return Err(DagError::DuplicateChangeSet(change_set.id));
        }
        self.elements.entry(change_set.id.clone()).or_default();
        self.change_sets.insert(change_set.id.clone(), change_set);
        Ok(())
    }

    /// Add an element, replacing any element for the same entity in the set.
    pub fn add_element(&mut self, element: ChangeSetElement) -> DagResult<()> {
        let set = self
            .elements
            .get_mut(&element.change_set_id)
            .ok_or_else(|| DagError::ChangeSetNotFound(element.change_set_id.clone()))?;
        if let Some(previous) = set.insert(element.entity_key(), element.clone()) {
            if let Some(sets) = self.change_index.get_mut(&previous.change_id) {
                sets.remove(&previous.change_set_id);
            }
        }
        self.change_index
            .entry(element.change_id)
            .or_default()
            .insert(element.change_set_id);
        Ok(())
    }

    /// Remove every element of a change set.
    pub fn clear_change_set(&mut self, id: &ChangeSetId) -> DagResult<()> {
        let set = self
            .elements
            .get_mut(id)
            .ok_or_else(|| DagError::ChangeSetNotFound(id.clone()))?;
        for element in std::mem::take(set).into_values() {
            if let Some(sets) = self.change_index.get_mut(&element.change_id) {
                sets.remove(id);
            }
        }
        Ok(())
    }

    pub fn change_set(&self, id: &ChangeSetId) -> Option<&ChangeSet> {
        self.change_sets.get(id)
    }

    pub fn change_sets(&self) -> impl Iterator<Item = &ChangeSet> {
        self.change_sets.values()
    }

    /// Elements of a change set in entity order.
    pub fn elements(&self, id: &ChangeSetId) -> impl Iterator<Item = &ChangeSetElement> {
        self.elements.get(id).into_iter().flat_map(|set| set.values())
    }

    pub fn element_for(&self, id: &ChangeSetId, key: &EntityKey) -> Option<&ChangeSetElement> {
        self.elements.get(id)?.get(key)
    }

    pub fn all_elements(&self) -> impl Iterator<Item = &ChangeSetElement> {
        self.elements.values().flat_map(|set| set.values())
    }

    /// Commits whose change set contains `change_id`.
    pub fn commits_containing(&self, change_id: &ChangeId) -> Vec<&CommitId> {
        self.change_index
            .get(change_id)
            .into_iter()
            .flatten()
            .filter_map(|cs| self.change_set_commit.get(cs))
            .collect()
    }

    // ---------------------------------------------------------------
    // Commits
    // ---------------------------------------------------------------

    /// Add a commit with the given parents.
    ///
    /// Every parent must already exist and the commit's change set must
    /// exist and not belong to another commit. Because parents must exist
    /// before their children, the graph can never contain a cycle.
    pub fn add_commit(&mut self, commit: Commit, parents: &[CommitId]) -> DagResult<()> {
        if self.commits.contains_key(&commit.id) {
            return Err(DagError::DuplicateCommit(commit.id));
        }
        for parent in parents {
            if !self.commits.contains_key(parent) {
                return Err(DagError::DanglingParent {
                    commit: commit.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        if !self.change_sets.contains_key(&commit.change_set_id) {
            return Err(DagError::ChangeSetNotFound(commit.change_set_id.clone()));
        }
        if let Some(owner) = self.change_set_commit.get(&commit.change_set_id) {
            return Err(DagError::ChangeSetInUse {
                change_set: commit.change_set_id.clone(),
                commit: owner.clone(),
            });
        }

        let mut unique: Vec<CommitId> = Vec::with_capacity(parents.len());
        for parent in parents {
            if !unique.contains(parent) {
                unique.push(parent.clone());
            }
        }
        for parent in &unique {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(commit.id.clone());
        }
        debug!(commit = %commit.id, parents = unique.len(), "added commit");
        self.parents.insert(commit.id.clone(), unique);
        self.change_set_commit
            .insert(commit.change_set_id.clone(), commit.id.clone());
        self.order.push(commit.id.clone());
        self.commits.insert(commit.id.clone(), commit);
        Ok(())
    }

    pub fn get(&self, id: &CommitId) -> Option<&Commit> {
        self.commits.get(id)
    }

    pub fn require(&self, id: &CommitId) -> DagResult<&Commit> {
        self.commits
            .get(id)
            .ok_or_else(|| DagError::CommitNotFound(id.clone()))
    }

    pub fn contains(&self, id: &CommitId) -> bool {
        self.commits.contains_key(id)
    }

    /// Commits in insertion order.
    pub fn commits(&self) -> impl Iterator<Item = &Commit> {
        self.order.iter().filter_map(|id| self.commits.get(id))
    }

    pub fn parents(&self, id: &CommitId) -> &[CommitId] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, id: &CommitId) -> &[CommitId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All commit edges in commit insertion order.
    pub fn edges(&self) -> Vec<CommitEdge> {
        self.order
            .iter()
            .flat_map(|child| {
                self.parents(child).iter().map(move |parent| CommitEdge {
                    parent_id: parent.clone(),
                    child_id: child.clone(),
                })
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// All ancestors of `id`, including `id` itself (BFS over parents).
    pub fn ancestors(&self, id: &CommitId) -> HashSet<CommitId> {
        let mut visited = HashSet::new();
        if !self.commits.contains_key(id) {
            return visited;
        }
        let mut queue = VecDeque::new();
        visited.insert(id.clone());
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            for parent in self.parents(&current) {
                if visited.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
        }
        visited
    }

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> bool {
        if ancestor == descendant {
            return self.contains(ancestor);
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([descendant.clone()]);
        while let Some(current) = queue.pop_front() {
            for parent in self.parents(&current) {
                if parent == ancestor {
                    return true;
                }
                if visited.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
        }
        false
    }

    /// Commits reachable from `source` but not from `target`, parents first.
    pub fn commits_between(&self, source: &CommitId, target: &CommitId) -> Vec<CommitId> {
        let exclude = self.ancestors(target);
        let include: HashSet<CommitId> = self
            .ancestors(source)
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .collect();
        self.topological_order(&include)
    }

    /// The lowest common ancestor of two commits.
    ///
    /// Among common ancestors, picks one that is not a proper ancestor of
    /// another common ancestor, preferring the latest `created_at` (then the
    /// greatest id) when several qualify.
    pub fn common_ancestor(&self, a: &CommitId, b: &CommitId) -> Option<CommitId> {
        let ancestors_a = self.ancestors(a);
        let ancestors_b = self.ancestors(b);
        let common: HashSet<&CommitId> = ancestors_a.intersection(&ancestors_b).collect();
        if common.is_empty() {
            return None;
        }
        // A common ancestor with a child in the common set is not lowest.
        common
            .iter()
            .filter(|id| !self.children(id).iter().any(|child| common.contains(child)))
            .filter_map(|id| self.commits.get(*id))
            .max_by(|x, y| x.created_at.cmp(&y.created_at).then_with(|| x.id.cmp(&y.id)))
            .map(|c| c.id.clone())
    }

    /// Order a subset of commits parents-first (Kahn's algorithm).
    ///
    /// Ties break by `created_at`, then by id, so the result is stable.
    pub fn topological_order(&self, subset: &HashSet<CommitId>) -> Vec<CommitId> {
        let mut in_degree: HashMap<&CommitId, usize> = subset
            .iter()
            .map(|id| {
                let deg = self
                    .parents(id)
                    .iter()
                    .filter(|p| subset.contains(*p))
                    .count();
                (id, deg)
            })
            .collect();

        let sort_key = |id: &CommitId| {
            (
                self.commits.get(id).map(|c| c.created_at),
                id.clone(),
            )
        };
        let mut ready: BTreeSet<_> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| sort_key(id))
            .collect();

        let mut result = Vec::with_capacity(subset.len());
        while let Some(next) = ready.pop_first() {
            let id = next.1;
            for child in self.children(&id) {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(sort_key(child));
                    }
                }
            }
            result.push(id);
        }
        result
    }

    /// Every commit parents-first.
    pub fn full_topological_order(&self) -> Vec<CommitId> {
        let all: HashSet<CommitId> = self.commits.keys().cloned().collect();
        self.topological_order(&all)
    }

    // ---------------------------------------------------------------
    // Import / export
    // ---------------------------------------------------------------

    pub fn to_image(&self) -> GraphImage {
        GraphImage {
            change_sets: self.change_sets.values().cloned().collect(),
            elements: self.all_elements().cloned().collect(),
            commits: self.commits().cloned().collect(),
            edges: self.edges(),
        }
    }

    pub fn from_image(image: GraphImage) -> DagResult<Self> {
        let mut graph = Self::new();
        graph.import(image)?;
        Ok(graph)
    }

    /// Import change sets, elements and commits that are missing locally.
    ///
    /// Commits already present must match exactly. Returns the ids of the
    /// newly added commits.
    pub fn import(&mut self, image: GraphImage) -> DagResult<Vec<CommitId>> {
        let mut new_sets = HashSet::new();
        for cs in image.change_sets {
            if !self.change_sets.contains_key(&cs.id) {
                new_sets.insert(cs.id.clone());
                self.add_change_set(cs)?;
            }
        }
        for element in image.elements {
            if new_sets.contains(&element.change_set_id) {
                self.add_element(element)?;
            }
        }

        let mut parents: HashMap<CommitId, Vec<CommitId>> = HashMap::new();
        for edge in image.edges {
            parents.entry(edge.child_id).or_default().push(edge.parent_id);
        }
        let mut pending: Vec<Commit> = Vec::new();
        for commit in image.commits {
            match self.commits.get(&commit.id) {
                Some(existing) if *existing == commit => {}
                Some(_) => return Err(DagError::ConflictingCommit(commit.id)),
                None => pending.push(commit),
            }
        }

        // Insert parents before children, whatever order the image used.
        let mut added = Vec::new();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for commit in pending {
                let commit_parents = parents.get(&commit.id).cloned().unwrap_or_default();
                if commit_parents.iter().all(|p| self.commits.contains_key(p)) {
                    added.push(commit.id.clone());
                    self.add_commit(commit, &commit_parents)?;
                } else {
                    deferred.push(commit);
                }
            }
            if deferred.len() == before {
                let commit = &deferred[0];
                let missing = parents
                    .get(&commit.id)
                    .and_then(|ps| ps.iter().find(|p| !self.commits.contains_key(*p)))
                    .cloned()
                    .unwrap_or_else(|| commit.id.clone());
                return Err(DagError::DanglingParent {
                    commit: commit.id.clone(),
                    parent: missing,
                });
            }
            pending = deferred;
        }
        Ok(added)
    }
}
