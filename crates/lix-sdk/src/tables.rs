//! Row builders for the read-only history tables and the entity views.

use lix_query::eval::json_extract;
use lix_query::Row;
use lix_schema::{EntityViewDef, LIXCOL_COLUMNS, LIXCOL_PREFIX};
use lix_state::StateRow;
use lix_store::SnapshotStore;
use serde_json::Value;

use crate::database::Database;
use crate::error::LixResult;

/// Tables exposing history itself. Writes to them are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HistoryTable {
    Change,
    Snapshot,
    Commit,
    CommitEdge,
    ChangeSet,
    ChangeSetElement,
    Version,
    ActiveVersion,
    ChangeConflict,
}

impl HistoryTable {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "change" => Self::Change,
            "snapshot" => Self::Snapshot,
            "commit" => Self::Commit,
            "commit_edge" => Self::CommitEdge,
            "change_set" => Self::ChangeSet,
            "change_set_element" => Self::ChangeSetElement,
            "version" => Self::Version,
            "active_version" => Self::ActiveVersion,
            "change_conflict" => Self::ChangeConflict,
            _ => return None,
        })
    }

    pub(crate) fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Change => &[
                "id",
                "entity_id",
                "schema_key",
                "schema_version",
                "file_id",
                "plugin_key",
                "snapshot_id",
                "snapshot_content",
                "version_id",
                "created_at",
            ],
            Self::Snapshot => &["id", "content"],
            Self::Commit => &[
                "id",
                "change_set_id",
                "author_account_ids",
                "description",
                "created_at",
            ],
            Self::CommitEdge => &["parent_id", "child_id"],
            Self::ChangeSet => &["id", "name"],
            Self::ChangeSetElement => &[
                "change_set_id",
                "change_id",
                "entity_id",
                "schema_key",
                "file_id",
            ],
            Self::Version => &[
                "id",
                "name",
                "commit_id",
                "working_change_set_id",
                "inherited_from_version_id",
                "hidden",
            ],
            Self::ActiveVersion => &["version_id"],
            Self::ChangeConflict => &[
                "id",
                "entity_id",
                "schema_key",
                "file_id",
                "source_version_id",
                "target_version_id",
                "merge_commit_id",
                "target_change_id",
                "source_change_id",
                "resolved_by_change_id",
                "created_at",
            ],
        }
    }

    pub(crate) fn rows(self, db: &Database) -> LixResult<Vec<Row>> {
        let columns = self.columns();
        let build = |values: Vec<Value>| -> Row {
            columns
                .iter()
                .map(|c| c.to_string())
                .zip(values)
                .collect()
        };
        let rows = match self {
            Self::Change => {
                let mut rows = Vec::with_capacity(db.changes.len());
                for change in db.changes.iter() {
                    let content = db.snapshots.content(&change.snapshot_id)?;
                    rows.push(build(vec![
                        text(&change.id),
                        text(&change.entity_id),
                        text(&change.schema_key),
                        Value::String(change.schema_version.clone()),
                        text(&change.file_id),
                        Value::String(change.plugin_key.clone()),
                        text(change.snapshot_id.to_hex()),
                        content.unwrap_or(Value::Null),
                        text(&change.version_id),
                        text(change.created_at.to_iso()),
                    ]));
                }
                rows
            }
            Self::Snapshot => db
                .snapshots
                .all()
                .into_iter()
                .map(|s| build(vec![text(s.id.to_hex()), s.content.unwrap_or(Value::Null)]))
                .collect(),
            Self::Commit => db
                .graph
                .commits()
                .map(|c| {
                    build(vec![
                        text(&c.id),
                        text(&c.change_set_id),
                        Value::Array(c.author_account_ids.iter().map(text).collect()),
                        c.description.clone().map_or(Value::Null, Value::String),
                        text(c.created_at.to_iso()),
                    ])
                })
                .collect(),
            Self::CommitEdge => db
                .graph
                .edges()
                .into_iter()
                .map(|e| build(vec![text(&e.parent_id), text(&e.child_id)]))
                .collect(),
            Self::ChangeSet => db
                .graph
                .change_sets()
                .map(|cs| build(vec![text(&cs.id), cs.name.clone().map_or(Value::Null, Value::String)]))
                .collect(),
            Self::ChangeSetElement => db
                .graph
                .all_elements()
                .map(|e| {
                    build(vec![
                        text(&e.change_set_id),
                        text(&e.change_id),
                        text(&e.entity_id),
                        text(&e.schema_key),
                        text(&e.file_id),
                    ])
                })
                .collect(),
            Self::Version => db
                .versions
                .all()
                .map(|v| {
                    build(vec![
                        text(&v.id),
                        Value::String(v.name.clone()),
                        text(&v.commit_id),
                        text(&v.working_change_set_id),
                        v.inherited_from_version_id.as_ref().map_or(Value::Null, text),
                        Value::Bool(v.hidden),
                    ])
                })
                .collect(),
            Self::ActiveVersion => vec![build(vec![text(db.versions.active_id())])],
            Self::ChangeConflict => db
                .conflicts
                .all()
                .map(|c| {
                    build(vec![
                        text(&c.id),
                        text(&c.key.entity_id),
                        text(&c.key.schema_key),
                        text(&c.key.file_id),
                        text(&c.source_version_id),
                        text(&c.target_version_id),
                        text(&c.merge_commit_id),
                        text(&c.target_change_id),
                        text(&c.source_change_id),
                        c.resolved_by_change_id.as_ref().map_or(Value::Null, text),
                        text(c.created_at.to_iso()),
                    ])
                })
                .collect(),
        };
        Ok(rows)
    }
}

fn text(value: impl ToString) -> Value {
    Value::String(value.to_string())
}

/// A state row in the `state_all` shape.
pub(crate) fn state_row(row: &StateRow) -> Row {
    row.to_columns().into_iter().collect()
}

/// A state row in the shape of an entity view: properties extracted from
/// the snapshot, then the `lixcol_` columns.
pub(crate) fn view_row(def: &EntityViewDef, row: &StateRow) -> Row {
    let mut out = Row::new();
    for property in &def.property_columns {
        out.insert(property.clone(), json_extract(&row.snapshot_content, property));
    }
    let columns = row.to_columns();
    for base in LIXCOL_COLUMNS {
        out.insert(
            format!("{LIXCOL_PREFIX}{base}"),
            columns.get(*base).cloned().unwrap_or(Value::Null),
        );
    }
    out
}

// ---- Column access on written rows ----

pub(crate) fn column_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// SQL-style truthiness of a flag column; absent or NULL is false.
pub(crate) fn column_flag(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(value_flag)
}

pub(crate) fn value_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

/// A JSON column that may arrive as JSON text through a parameter.
pub(crate) fn column_json(row: &Row, column: &str) -> Option<Value> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => serde_json::from_str(s).ok().or_else(|| Some(Value::String(s.clone()))),
        other => Some(other.clone()),
    }
}
