//! Version operations: branch, switch, rename, delete, checkpoint.

use lix_refs::{Version, GLOBAL_VERSION_ID};
use lix_schema::builtin::CHECKPOINT_LABEL;
use lix_types::{ChangeSetId, VersionId};
use tracing::info;

use crate::entities::{ChangeSetLabel, Label};
use crate::error::{LixError, LixResult};
use crate::transaction::Transaction;

impl Transaction<'_> {
    pub fn active_version(&self) -> Version {
        self.db.versions.active().clone()
    }

    /// Every version, the hidden `global` one included.
    pub fn versions(&self) -> Vec<Version> {
        self.db.versions.all().cloned().collect()
    }

    pub fn version_by_name(&self, name: &str) -> LixResult<Version> {
        Ok(self.db.versions.by_name(name)?.clone())
    }

    /// Branch a new version off `from` (the active version by default).
    ///
    /// The new version starts at `from`'s commit with an empty working
    /// change set and inherits from `global`. Without a name it is named
    /// after its id.
    pub fn create_version(&mut self, name: Option<&str>, from: Option<&VersionId>) -> LixResult<Version> {
        self.create_version_with(
            None,
            name,
            from.cloned(),
            Some(VersionId::new(GLOBAL_VERSION_ID)),
        )
    }

    pub(crate) fn create_version_with(
        &mut self,
        id: Option<VersionId>,
        name: Option<&str>,
        from: Option<VersionId>,
        inherits_from: Option<VersionId>,
    ) -> LixResult<Version> {
        let from = from.unwrap_or_else(|| self.active_version_id());
        let commit_id = self.db.versions.require(&from)?.commit_id.clone();
        let id = id.unwrap_or_else(|| VersionId::new(self.db.provider.nano_id()));
        let version = Version {
            name: name.map_or_else(|| id.to_string(), str::to_string),
            id,
            commit_id,
            working_change_set_id: self.db.new_working_set()?,
            inherited_from_version_id: inherits_from,
            hidden: false,
        };
        self.db.versions.insert(version.clone())?;
        info!(version = %version.id, name = %version.name, from = %from, "created version");
        Ok(version)
    }

    /// Make `id` the active version. Only the pointer moves.
    pub fn switch_version(&mut self, id: &VersionId) -> LixResult<()> {
        self.db.versions.switch(id)?;
        Ok(())
    }

    pub fn rename_version(&mut self, id: &VersionId, name: &str) -> LixResult<()> {
        self.db.versions.rename(id, name)?;
        Ok(())
    }

    /// Delete a version together with its staged and untracked rows.
    /// Its commits stay in history.
    pub fn delete_version(&mut self, id: &VersionId) -> LixResult<()> {
        self.db.versions.delete(id)?;
        let staged: Vec<_> = self
            .db
            .staging
            .rows_for_version(id)
            .map(|row| row.key.clone())
            .collect();
        for key in staged {
            self.db.staging.unstage(&key)?;
        }
        self.db.untracked.remove_version(id);
        self.db.cache.mark_stale();
        Ok(())
    }

    /// Close the working change set of `version_id` (the active version by
    /// default) under the `checkpoint` label and start a fresh one.
    ///
    /// Pending writes are committed first so they land in the checkpoint.
    /// Returns the labelled change set.
    pub fn create_checkpoint(&mut self, version_id: Option<&VersionId>) -> LixResult<ChangeSetId> {
        let version_id = version_id.cloned().unwrap_or_else(|| self.active_version_id());
        self.db.commit_staged()?;

        let working = self.db.versions.require(&version_id)?.working_change_set_id.clone();
        let label = self
            .all::<Label>()?
            .into_iter()
            .find(|l| l.name == CHECKPOINT_LABEL)
            .ok_or_else(|| LixError::not_found("label", CHECKPOINT_LABEL))?;
        self.upsert(&ChangeSetLabel {
            change_set_id: working.to_string(),
            label_id: label.id,
        })?;

        let fresh = self.db.new_working_set()?;
        self.db.versions.set_working_change_set(&version_id, fresh)?;
        info!(version = %version_id, change_set = %working, "created checkpoint");
        Ok(working)
    }
}
