use std::collections::{BTreeMap, BTreeSet};

use lix_types::{StateKey, VersionId};
use tracing::trace;

use crate::entry::StagedRow;
use crate::error::{StagingError, StagingResult};

/// Counts of what is staged, for logging and inspection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagingSummary {
    pub tracked: usize,
    pub untracked: usize,
    pub deletions: usize,
    pub versions: usize,
}

/// The staging area of one transaction.
#[derive(Clone, Debug, Default)]
pub struct Staging {
    entries: BTreeMap<StateKey, StagedRow>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &StateKey) -> Option<&StagedRow> {
        self.entries.get(key)
    }

    // ---------------------------------------------------------------
    // Stage operations
    // ---------------------------------------------------------------

    /// Stage a row, replacing any pending row for the same key.
    ///
    /// Returns the replaced row, if any.
    pub fn stage(&mut self, row: StagedRow) -> StagingResult<Option<StagedRow>> {
        if let Some(existing) = self.entries.get(&row.key) {
            if existing.untracked != row.untracked {
                return Err(StagingError::TrackingMismatch(row.key.clone()));
            }
        }
        trace!(key = ?row.key, deletion = row.is_deletion(), "staged row");
        Ok(self.entries.insert(row.key.clone(), row))
    }

    /// Remove a pending row without committing it.
    pub fn unstage(&mut self, key: &StateKey) -> StagingResult<StagedRow> {
        self.entries
            .remove(key)
            .ok_or_else(|| StagingError::NotStaged(key.clone()))
    }

    /// Take every pending row, leaving the area empty.
    pub fn drain(&mut self) -> Vec<StagedRow> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Discard every pending row.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// All pending rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &StagedRow> {
        self.entries.values()
    }

    /// Pending rows of one version.
    pub fn rows_for_version<'a>(
        &'a self,
        version_id: &'a VersionId,
    ) -> impl Iterator<Item = &'a StagedRow> + 'a {
        self.entries
            .values()
            .filter(move |row| row.version_id() == version_id)
    }

    /// Versions with at least one pending tracked row.
    pub fn touched_versions(&self) -> BTreeSet<VersionId> {
        self.entries
            .values()
            .filter(|row| !row.untracked)
            .map(|row| row.version_id().clone())
            .collect()
    }

    pub fn summary(&self) -> StagingSummary {
        let mut summary = StagingSummary::default();
        let mut versions = BTreeSet::new();
        for row in self.entries.values() {
            if row.untracked {
                summary.untracked += 1;
            } else {
                summary.tracked += 1;
            }
            if row.is_deletion() {
                summary.deletions += 1;
            }
            versions.insert(row.version_id());
        }
        summary.versions = versions.len();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lix_types::{ChangeId, EntityKey, Timestamp};
    use serde_json::json;

    fn row(entity: &str, version: &str, content: Option<serde_json::Value>) -> StagedRow {
        StagedRow {
            key: EntityKey::new(entity, "note", "lix").in_version(&VersionId::new(version)),
            schema_version: "1.0".into(),
            plugin_key: "lix_own_entity".into(),
            content,
            untracked: false,
            change_id: ChangeId::new(format!("c-{entity}-{version}")),
            created_at: Timestamp::zero(),
        }
    }

    #[test]
    fn last_write_wins_per_key() {
        let mut staging = Staging::new();
        assert!(staging.stage(row("n1", "main", Some(json!({"text": "a"})))).unwrap().is_none());
        let replaced = staging.stage(row("n1", "main", Some(json!({"text": "b"})))).unwrap();
        assert_eq!(replaced.unwrap().content, Some(json!({"text": "a"})));
        assert_eq!(staging.len(), 1);
        let key = EntityKey::new("n1", "note", "lix").in_version(&VersionId::new("main"));
        assert_eq!(staging.get(&key).unwrap().content, Some(json!({"text": "b"})));
    }

    #[test]
    fn keys_differ_by_version() {
        let mut staging = Staging::new();
        staging.stage(row("n1", "main", None)).unwrap();
        staging.stage(row("n1", "feature", None)).unwrap();
        assert_eq!(staging.len(), 2);
        assert_eq!(staging.touched_versions().len(), 2);
        assert_eq!(staging.rows_for_version(&VersionId::new("main")).count(), 1);
    }

    #[test]
    fn drain_empties() {
        let mut staging = Staging::new();
        staging.stage(row("a", "main", None)).unwrap();
        staging.stage(row("b", "main", None)).unwrap();
        let rows = staging.drain();
        assert_eq!(rows.len(), 2);
        assert!(staging.is_empty());
    }

    #[test]
    fn tracking_cannot_flip_within_a_transaction() {
        let mut staging = Staging::new();
        staging.stage(row("a", "main", None)).unwrap();
        let mut untracked = row("a", "main", None);
        untracked.untracked = true;
        assert!(matches!(
            staging.stage(untracked),
            Err(StagingError::TrackingMismatch(_))
        ));
    }

    #[test]
    fn summary_counts() {
        let mut staging = Staging::new();
        staging.stage(row("a", "main", None)).unwrap();
        let mut u = row("b", "main", Some(json!({})));
        u.untracked = true;
        staging.stage(u).unwrap();
        assert_eq!(
            staging.summary(),
            StagingSummary {
                tracked: 1,
                untracked: 1,
                deletions: 1,
                versions: 1
            }
        );
    }

    #[test]
    fn unstage_missing_fails() {
        let mut staging = Staging::new();
        let key = EntityKey::new("x", "note", "lix").in_version(&VersionId::new("main"));
        assert!(matches!(staging.unstage(&key), Err(StagingError::NotStaged(_))));
    }
}
