//! Commit graph for lix.
//!
//! Commits group the changes of one finalised transaction (through a change
//! set) and link to their parent commits through commit edges. The result is
//! a DAG: merge commits have two parents, every other commit one, the root
//! commit none.
//!
//! # Invariants
//!
//! - The graph is acyclic: a commit may only name parents that already exist.
//! - A commit's parents are immutable once written.
//! - A change set holds at most one change per entity.
//!
//! Ancestry queries use explicit worklist/visited-set traversals. Leaf
//! detection ([`CommitGraph::leaf_changes`]) finds, for every entity reachable
//! from a head commit, the changes not superseded by a descendant commit.

pub mod change_set;
pub mod commit;
pub mod error;
pub mod graph;
pub mod leaf;

pub use change_set::{ChangeSet, ChangeSetElement};
pub use commit::{Commit, CommitEdge};
pub use error::{DagError, DagResult};
pub use graph::{CommitGraph, GraphImage};
pub use leaf::{LeafChange, LeafSet};
