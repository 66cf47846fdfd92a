use std::collections::BTreeMap;

use lix_types::{StateKey, Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row stored outside the change log. It has no history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UntrackedRow {
    pub key: StateKey,
    pub plugin_key: String,
    pub schema_version: String,
    pub content: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Untracked rows keyed by `(version, entity)`.
#[derive(Clone, Debug, Default)]
pub struct UntrackedStore {
    rows: BTreeMap<StateKey, UntrackedRow>,
}

impl UntrackedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<UntrackedRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    /// Insert or replace a row. A replaced row keeps its `created_at`.
    pub fn upsert(&mut self, mut row: UntrackedRow) {
        if let Some(existing) = self.rows.get(&row.key) {
            row.created_at = existing.created_at;
        }
        self.rows.insert(row.key.clone(), row);
    }

    pub fn delete(&mut self, key: &StateKey) -> Option<UntrackedRow> {
        self.rows.remove(key)
    }

    pub fn get(&self, key: &StateKey) -> Option<&UntrackedRow> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = &UntrackedRow> {
        self.rows.values()
    }

    pub fn rows_for_version<'a>(
        &'a self,
        version_id: &'a VersionId,
    ) -> impl Iterator<Item = &'a UntrackedRow> + 'a {
        self.rows.values().filter(move |r| r.key.version_id == *version_id)
    }

    /// Drop every row of a version (used when the version is deleted).
    pub fn remove_version(&mut self, version_id: &VersionId) {
        self.rows.retain(|key, _| key.version_id != *version_id);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
