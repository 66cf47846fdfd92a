//! Merge engine for lix.
//!
//! Merging a source version into a target version creates one commit with
//! two parents (the target head, then the source head) that references every
//! source change the target has not seen. Entities both sides changed to
//! different content keep the target's value and are recorded as conflicts;
//! a conflict is settled by a later change on top of the merge, never by
//! rewriting history.
//!
//! # Key Types
//!
//! - [`MergePlan`] -- what a merge would adopt, keep and report
//! - [`ConflictStore`] / [`ConflictRecord`] -- recorded conflicts and their resolution
//! - [`DatabaseDiff`] -- what another copy of a database holds that this one lacks

pub mod conflict;
pub mod database;
pub mod error;
pub mod plan;

pub use conflict::{ConflictRecord, ConflictStore};
pub use database::{diff_databases, DatabaseDiff, DatabaseSide};
pub use error::{ConflictError, ConflictResult, MergeError, MergeResult};
pub use plan::{
    apply_merge, plan_commits, plan_merge, MergeCommit, MergeInput, MergePlan, MergedChange,
    PlannedConflict,
};
