//! Merges between versions and between copies of a database, change
//! proposals, and conflict resolution.

use lix_merge::{diff_databases, plan_commits, plan_merge, ConflictRecord, DatabaseSide, MergeInput};
use lix_pack::decode_blob;
use lix_refs::Version;
use lix_schema::builtin::CHANGE_PROPOSAL;
use lix_store::SnapshotStore;
use lix_types::{ChangeId, ConflictId, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::database::{Database, DatabaseImage, MergeOutcome};
use crate::entities::{ChangeProposal, ProposalStatus};
use crate::error::{LixError, LixResult, TransactionError};
use crate::transaction::{Transaction, WriteTarget};

/// What merging another copy of the database brought in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMergeOutcome {
    pub imported_changes: usize,
    pub imported_commits: usize,
    /// Versions that only existed in the other copy.
    pub new_versions: Vec<VersionId>,
    /// One merge per version both copies had moved apart on.
    pub merges: Vec<MergeOutcome>,
}

impl Transaction<'_> {
    // ---- Version merge ----

    /// Merge `source` into `target`.
    ///
    /// Pending writes are committed first. The merge commit has the target
    /// head and the source head as parents; merging again without new
    /// source changes is a no-op.
    pub fn merge_version(&mut self, source: &VersionId, target: &VersionId) -> LixResult<MergeOutcome> {
        self.db.commit_staged()?;
        let plan = plan_merge(
            MergeInput {
                graph: &self.db.graph,
                changes: &self.db.changes,
                versions: &self.db.versions,
            },
            source,
            target,
        )?;
        let outcome = self.db.apply_plan(&plan)?;
        info!(
            source = %source,
            target = %target,
            adopted = outcome.adopted,
            conflicts = outcome.conflicts.len(),
            "merged version"
        );
        Ok(outcome)
    }

    // ---- Change proposals ----

    pub fn create_change_proposal(
        &mut self,
        source: &VersionId,
        target: &VersionId,
    ) -> LixResult<ChangeProposal> {
        self.db.versions.require(source)?;
        self.db.versions.require(target)?;
        let content = json!({
            "source_version_id": source.as_str(),
            "target_version_id": target.as_str(),
            "status": ProposalStatus::Open.as_str(),
        });
        let target_version = WriteTarget::version(self.active_version_id());
        let key = self.insert_entity(CHANGE_PROPOSAL, content, &target_version, false)?;
        self.get::<ChangeProposal>(key.key.entity_id.as_str())?
            .ok_or_else(|| LixError::not_found("change proposal", &key.key.entity_id))
    }

    pub fn change_proposals(&self) -> LixResult<Vec<ChangeProposal>> {
        self.all()
    }

    /// Merge the proposal's source into its target, mark it accepted and
    /// delete the source version.
    pub fn accept_change_proposal(&mut self, id: &str) -> LixResult<MergeOutcome> {
        let proposal = self.open_proposal(id)?;
        let source = VersionId::new(proposal.source_version_id.as_str());
        let target = VersionId::new(proposal.target_version_id.as_str());

        let outcome = self.merge_version(&source, &target)?;
        self.upsert(&ChangeProposal {
            status: ProposalStatus::Accepted,
            ..proposal
        })?;
        if *self.db.versions.active_id() == source {
            self.switch_version(&target)?;
        }
        self.delete_version(&source)?;
        info!(proposal = %id, source = %source, target = %target, "accepted change proposal");
        Ok(outcome)
    }

    pub fn reject_change_proposal(&mut self, id: &str) -> LixResult<()> {
        let proposal = self.open_proposal(id)?;
        self.upsert(&ChangeProposal {
            status: ProposalStatus::Rejected,
            ..proposal
        })?;
        info!(proposal = %id, "rejected change proposal");
        Ok(())
    }

    fn open_proposal(&self, id: &str) -> LixResult<ChangeProposal> {
        let proposal = self
            .get::<ChangeProposal>(id)?
            .ok_or_else(|| LixError::not_found("change proposal", id))?;
        if proposal.status != ProposalStatus::Open {
            return Err(TransactionError::ProposalNotOpen {
                id: id.to_string(),
                status: proposal.status.as_str().to_string(),
            }
            .into());
        }
        Ok(proposal)
    }

    // ---- Conflicts ----

    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.db.conflicts.all().cloned().collect()
    }

    pub fn open_conflicts(&self) -> Vec<ConflictRecord> {
        self.db.conflicts.open().cloned().collect()
    }

    /// Mark conflict `conflict_id` resolved by the committed change
    /// `change_id`. Pending writes are committed first, so the resolving
    /// change may have been written earlier in this transaction.
    pub fn resolve_conflict(&mut self, conflict_id: &ConflictId, change_id: &ChangeId) -> LixResult<ConflictRecord> {
        self.db.commit_staged()?;
        let db = &mut *self.db;
        let change = db.changes.require(change_id)?.clone();
        let record = db.conflicts.resolve(conflict_id, &change, &db.graph)?;
        Ok(record.clone())
    }

    // ---- Cross-database merge ----

    /// Merge another copy of this database, given as an exported blob.
    ///
    /// Everything the other copy has that this one lacks is imported:
    /// snapshots, changes, change sets and commits. Versions only the other
    /// copy has are added; versions both have are merged, the other copy's
    /// head acting as the source.
    pub fn merge_database(&mut self, blob: &[u8]) -> LixResult<DatabaseMergeOutcome> {
        self.db.commit_staged()?;
        let (_, image): (_, DatabaseImage) = decode_blob(blob)?;
        if image.lix_id != self.db.lix_id {
            warn!(ours = %self.db.lix_id, theirs = %image.lix_id, "merging a database with a different lix id");
        }
        let other = Database::from_image(image)?;

        let diff = diff_databases(
            DatabaseSide {
                graph: &self.db.graph,
                changes: &self.db.changes,
            },
            DatabaseSide {
                graph: &other.graph,
                changes: &other.changes,
            },
            other.versions.all().map(|v| &v.commit_id),
        );
        let mut outcome = DatabaseMergeOutcome {
            imported_changes: diff.changes.len(),
            ..Default::default()
        };

        for id in &diff.snapshots {
            if let Some(snapshot) = other.snapshots.read(id)? {
                self.db.snapshots.import(&snapshot)?;
            }
        }
        for change in diff.changes {
            self.db.changes.append(change)?;
        }
        outcome.imported_commits = self.db.graph.import(other.graph.to_image())?.len();
        for record in other.conflicts.all() {
            if self.db.conflicts.get(&record.id).is_none() {
                self.db.conflicts.insert(record.clone());
            }
        }

        for theirs in other.versions.all() {
            match self.db.versions.get(&theirs.id).cloned() {
                Some(ours) => {
                    if ours.commit_id == theirs.commit_id {
                        continue;
                    }
                    let mut plan = plan_commits(
                        &self.db.graph,
                        &self.db.changes,
                        &theirs.commit_id,
                        &ours.commit_id,
                    )?;
                    plan.source_version_id = theirs.id.clone();
                    plan.target_version_id = ours.id.clone();
                    let merged = self.db.apply_plan(&plan)?;
                    if merged.commit_id.is_some() {
                        outcome.merges.push(merged);
                    }
                }
                None => {
                    self.adopt_version(theirs.clone())?;
                    outcome.new_versions.push(theirs.id.clone());
                }
            }
        }
        self.db.register_stored_schemas()?;
        self.db.cache.mark_stale();
        info!(
            changes = outcome.imported_changes,
            commits = outcome.imported_commits,
            versions = outcome.new_versions.len(),
            merges = outcome.merges.len(),
            "merged database"
        );
        Ok(outcome)
    }

    /// Add a version from another copy, renaming it when its name is taken.
    fn adopt_version(&mut self, mut version: Version) -> LixResult<()> {
        if self.db.versions.by_name(&version.name).is_ok() {
            version.name = format!("{}-{}", version.name, version.id);
        }
        self.db.versions.upsert(version)?;
        Ok(())
    }
}
