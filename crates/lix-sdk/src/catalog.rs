//! The relational surface of a transaction.
//!
//! Reads of logical views are normally rewritten by the preprocessor into
//! reads of the per-schema cache tables. With rewriting disabled the same
//! views are served here straight from history, which is how the two paths
//! are kept equivalent. Writes to entity views, `state` and `state_all`
//! become staged rows; `version` and `active_version` accept the few
//! writes that map onto version operations; the other history tables are
//! read-only.

use std::collections::BTreeSet;

use lix_query::{Catalog, QueryError, RewriteContext, Row, ScanFilter, STATE_ALL_VIEW, STATE_VIEW};
use lix_refs::GLOBAL_VERSION_ID;
use lix_schema::builtin::FILE;
use lix_schema::{lixcol_name, EntityViewDef, LIXCOL_PREFIX};
use lix_state::{StateFilter, CACHE_TABLE_PREFIX, STATE_COLUMNS};
use lix_types::{EntityKey, FileId, StateKey, VersionId};
use serde_json::{Map, Value};

use crate::database::{DEFAULT_FILE_ID, OWN_ENTITY_PLUGIN};
use crate::error::{LixError, LixResult, TransactionError};
use crate::tables::{
    column_flag, column_json, column_text, state_row, value_flag, view_row, HistoryTable,
};
use crate::transaction::{Transaction, WriteTarget};

/// What a table name refers to.
enum Target {
    /// `internal_state_cache` or one schema's `internal_state_cache_<key>`.
    Cache(Option<String>),
    State { all: bool },
    View { def: EntityViewDef, all: bool },
    History(HistoryTable),
}

impl Transaction<'_> {
    fn target(&self, table: &str) -> LixResult<Target> {
        if table == CACHE_TABLE_PREFIX {
            return Ok(Target::Cache(None));
        }
        if let Some(key) = table
            .strip_prefix(CACHE_TABLE_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return Ok(Target::Cache(Some(key.to_string())));
        }
        if table == STATE_VIEW {
            return Ok(Target::State { all: false });
        }
        if table == STATE_ALL_VIEW {
            return Ok(Target::State { all: true });
        }
        if let Some(history) = HistoryTable::parse(table) {
            return Ok(Target::History(history));
        }
        if let Some((def, _)) = self.db.registry.view_named(table) {
            let all = table == def.all_view_name;
            return Ok(Target::View { def, all });
        }
        Err(QueryError::UnknownTable(table.to_string()).into())
    }

    /// Rows filter for a logical view: the active version, or every version
    /// unless the WHERE clause pins `version_column` to one. `None` when the
    /// pinned version does not exist, so nothing can match.
    fn view_filter(&self, all: bool, scan: &ScanFilter, version_column: &str) -> Option<StateFilter> {
        if !all {
            return Some(StateFilter::version(self.db.versions.active_id().clone()));
        }
        match scan.equals(version_column) {
            None => Some(StateFilter::default()),
            Some(Value::String(id)) => {
                let id = VersionId::new(id.as_str());
                self.db.versions.contains(&id).then(|| StateFilter::version(id))
            }
            Some(_) => None,
        }
    }

    // ---- Entity view writes ----

    fn insert_view_row(&mut self, def: &EntityViewDef, all: bool, row: Row) -> LixResult<()> {
        let mut content = Map::new();
        let mut version_id = None;
        let mut target = WriteTarget::version(self.active_version_id());
        for (column, value) in row {
            match lixcol_name(&column) {
                Some("version_id") => {
                    version_id = value.as_str().map(VersionId::new);
                }
                Some("file_id") => {
                    if let Some(file) = value.as_str() {
                        target.file_id = FileId::new(file);
                    }
                }
                Some("plugin_key") => {
                    if let Some(plugin) = value.as_str() {
                        target.plugin_key = plugin.to_string();
                    }
                }
                Some("untracked") => target.untracked = value_flag(&value),
                Some(other) => {
                    return Err(invalid_column(&def.view_name, other, "is managed by the engine"));
                }
                None if column.starts_with(LIXCOL_PREFIX) => {
                    return Err(invalid_column(&def.view_name, &column, "is not a view column"));
                }
                None => {
                    if !value.is_null() {
                        content.insert(column, value);
                    }
                }
            }
        }
        if let Some(version_id) = version_id {
            if !all && version_id != target.version_id {
                return Err(invalid_column(
                    &def.view_name,
                    "lixcol_version_id",
                    "only the _all view writes to other versions",
                ));
            }
            target.version_id = version_id;
        }
        if def.schema_key == FILE {
            self.insert_file(Value::Object(content), &target)?;
            return Ok(());
        }
        self.insert_entity(&def.schema_key, Value::Object(content), &target, false)?;
        Ok(())
    }

    fn update_view_row(&mut self, def: &EntityViewDef, old: Row, new: Row) -> LixResult<()> {
        let key = self.view_key(def, &old)?;
        let mut content = match self.db.visible(&key)? {
            Some(row) => row.snapshot_content,
            None => Value::Object(Map::new()),
        };
        let Some(object) = content.as_object_mut() else {
            return Err(invalid_column(&def.view_name, "*", "stored content is not an object"));
        };
        for (column, value) in &new {
            if old.get(column) == Some(value) {
                continue;
            }
            if column.starts_with(LIXCOL_PREFIX) {
                return Err(invalid_column(&def.view_name, column, "is managed by the engine"));
            }
            if value.is_null() {
                object.remove(column);
            } else {
                object.insert(column.clone(), value.clone());
            }
        }
        let target = self.target_for(&key, &old, "lixcol_plugin_key", "lixcol_untracked");
        if def.schema_key == FILE {
            self.update_file(&key, content, &target)?;
            return Ok(());
        }
        self.update_entity(&key, content, &target)?;
        Ok(())
    }

    fn delete_view_row(&mut self, def: &EntityViewDef, row: Row) -> LixResult<()> {
        let key = self.view_key(def, &row)?;
        let target = self.target_for(&key, &row, "lixcol_plugin_key", "lixcol_untracked");
        if def.schema_key == FILE {
            return self.delete_file_at(&key, &target);
        }
        self.delete_entity(&key, &target)
    }

    /// The state key of a row read from an entity view.
    fn view_key(&self, def: &EntityViewDef, row: &Row) -> LixResult<StateKey> {
        let entity_id = column_text(row, "lixcol_entity_id").ok_or_else(|| {
            invalid_column(&def.view_name, "lixcol_entity_id", "is missing from the matched row")
        })?;
        let file_id =
            column_text(row, "lixcol_file_id").unwrap_or_else(|| DEFAULT_FILE_ID.to_string());
        let version = column_text(row, "lixcol_version_id")
            .map(VersionId::new)
            .unwrap_or_else(|| self.active_version_id());
        let version = self.db.home_version(&def.schema_key, &version);
        Ok(EntityKey::new(entity_id, def.schema_key.as_str(), file_id).in_version(&version))
    }

    fn target_for(&self, key: &StateKey, row: &Row, plugin_col: &str, untracked_col: &str) -> WriteTarget {
        let plugin = column_text(row, plugin_col).unwrap_or_else(|| OWN_ENTITY_PLUGIN.to_string());
        WriteTarget::version(key.version_id.clone())
            .in_file(key.key.file_id.clone(), plugin)
            .untracked(column_flag(row, untracked_col))
    }

    // ---- state / state_all writes ----

    fn insert_state_row(&mut self, all: bool, row: Row) -> LixResult<()> {
        let table = if all { STATE_ALL_VIEW } else { STATE_VIEW };
        let schema_key = column_text(&row, "schema_key")
            .ok_or_else(|| invalid_column(table, "schema_key", "is required"))?;
        let content = column_json(&row, "snapshot_content")
            .ok_or_else(|| invalid_column(table, "snapshot_content", "is required"))?;
        let mut target = WriteTarget::version(self.active_version_id());
        if let Some(version) = column_text(&row, "version_id") {
            let version = VersionId::new(version);
            if !all && version != target.version_id {
                return Err(invalid_column(table, "version_id", "only state_all writes to other versions"));
            }
            target.version_id = version;
        }
        if let Some(file) = column_text(&row, "file_id") {
            target.file_id = FileId::new(file);
        }
        if let Some(plugin) = column_text(&row, "plugin_key") {
            target.plugin_key = plugin;
        }
        target.untracked = column_flag(&row, "untracked");

        if let Some(entity_id) = column_text(&row, "entity_id") {
            let schema = self.db.registry.require(&schema_key)?;
            if schema.entity_id_of(&content).is_some_and(|id| id != entity_id) {
                return Err(invalid_column(table, "entity_id", "does not match the primary key"));
            }
        }
        self.insert_entity(&schema_key, content, &target, false)?;
        Ok(())
    }

    fn update_state_row(&mut self, all: bool, old: Row, new: Row) -> LixResult<()> {
        let table = if all { STATE_ALL_VIEW } else { STATE_VIEW };
        for column in STATE_COLUMNS {
            if *column != "snapshot_content" && old.get(*column) != new.get(*column) {
                return Err(invalid_column(table, column, "only snapshot_content can be updated"));
            }
        }
        let key = self.state_key(table, &old)?;
        let content = column_json(&new, "snapshot_content")
            .ok_or_else(|| invalid_column(table, "snapshot_content", "cannot be NULL; delete the row instead"))?;
        let target = self.target_for(&key, &old, "plugin_key", "untracked");
        self.update_entity(&key, content, &target)?;
        Ok(())
    }

    fn delete_state_row(&mut self, all: bool, row: Row) -> LixResult<()> {
        let table = if all { STATE_ALL_VIEW } else { STATE_VIEW };
        let key = self.state_key(table, &row)?;
        let target = self.target_for(&key, &row, "plugin_key", "untracked");
        self.delete_entity(&key, &target)
    }

    /// The state key of a row read from `state` or `state_all`.
    fn state_key(&self, table: &str, row: &Row) -> LixResult<StateKey> {
        let column = |name: &str| {
            column_text(row, name)
                .ok_or_else(|| invalid_column(table, name, "is missing from the matched row"))
        };
        let schema_key = column("schema_key")?;
        let version = self.db.home_version(&schema_key, &VersionId::new(column("version_id")?));
        let key = EntityKey::new(column("entity_id")?, schema_key, column("file_id")?);
        Ok(key.in_version(&version))
    }

    // ---- version / active_version writes ----

    fn insert_version_row(&mut self, row: Row) -> LixResult<()> {
        if column_text(&row, "commit_id").is_some() {
            return Err(invalid_column("version", "commit_id", "is set from the active version"));
        }
        let id = column_text(&row, "id").map(VersionId::new);
        let name = column_text(&row, "name");
        let inherits = match column_text(&row, "inherited_from_version_id") {
            Some(parent) => Some(VersionId::new(parent)),
            None => Some(VersionId::new(GLOBAL_VERSION_ID)),
        };
        self.create_version_with(id, name.as_deref(), None, inherits)?;
        Ok(())
    }

    fn update_version_row(&mut self, old: Row, new: Row) -> LixResult<()> {
        let id = column_text(&old, "id")
            .map(VersionId::new)
            .ok_or_else(|| invalid_column("version", "id", "is missing from the matched row"))?;
        for column in HistoryTable::Version.columns() {
            if old.get(*column) == new.get(*column) {
                continue;
            }
            match *column {
                "name" => {
                    let name = column_text(&new, "name")
                        .ok_or_else(|| invalid_column("version", "name", "cannot be NULL"))?;
                    self.rename_version(&id, &name)?;
                }
                other => return Err(invalid_column("version", other, "cannot be updated")),
            }
        }
        Ok(())
    }
}

impl Catalog for Transaction<'_> {
    type Error = LixError;

    fn rewrite_context(&mut self) -> LixResult<RewriteContext> {
        let views = self.db.registry.views();
        let schema_keys: BTreeSet<String> = views.iter().map(|v| v.schema_key.clone()).collect();
        Ok(RewriteContext {
            active_version_id: self.db.versions.active_id().to_string(),
            views,
            schema_keys,
        })
    }

    fn columns(&mut self, table: &str) -> LixResult<Vec<String>> {
        Ok(match self.target(table)? {
            Target::Cache(_) | Target::State { .. } => {
                STATE_COLUMNS.iter().map(|c| c.to_string()).collect()
            }
            Target::View { def, .. } => def.columns(),
            Target::History(history) => history.columns().iter().map(|c| c.to_string()).collect(),
        })
    }

    fn scan(&mut self, table: &str, scan: &ScanFilter) -> LixResult<Vec<Row>> {
        match self.target(table)? {
            Target::Cache(schema_key) => {
                let Some(mut filter) = self.view_filter(true, scan, "version_id") else {
                    return Ok(Vec::new());
                };
                filter.schema_key = schema_key.map(Into::into);
                Ok(self.db.cached_rows(&filter)?.iter().map(state_row).collect())
            }
            Target::State { all } => {
                let Some(filter) = self.view_filter(all, scan, "version_id") else {
                    return Ok(Vec::new());
                };
                Ok(self.db.resolved_rows(&filter)?.iter().map(state_row).collect())
            }
            Target::View { def, all } => {
                let Some(filter) = self.view_filter(all, scan, "lixcol_version_id") else {
                    return Ok(Vec::new());
                };
                let filter = filter.with_schema(def.schema_key.as_str());
                Ok(self
                    .db
                    .resolved_rows(&filter)?
                    .iter()
                    .map(|row| view_row(&def, row))
                    .collect())
            }
            Target::History(history) => history.rows(self.db),
        }
    }

    fn insert(&mut self, table: &str, rows: Vec<Row>) -> LixResult<usize> {
        let n = rows.len();
        match self.target(table)? {
            Target::View { def, all } => {
                check_view_writable(&def)?;
                for row in rows {
                    self.insert_view_row(&def, all, row)?;
                }
            }
            Target::State { all } => {
                for row in rows {
                    self.insert_state_row(all, row)?;
                }
            }
            Target::History(HistoryTable::Version) => {
                for row in rows {
                    self.insert_version_row(row)?;
                }
            }
            Target::History(_) | Target::Cache(_) => {
                return Err(TransactionError::ReadOnly(table.to_string()).into())
            }
        }
        Ok(n)
    }

    fn update(&mut self, table: &str, rows: Vec<(Row, Row)>) -> LixResult<usize> {
        let n = rows.len();
        match self.target(table)? {
            Target::View { def, .. } => {
                check_view_writable(&def)?;
                for (old, new) in rows {
                    self.update_view_row(&def, old, new)?;
                }
            }
            Target::State { all } => {
                for (old, new) in rows {
                    self.update_state_row(all, old, new)?;
                }
            }
            Target::History(HistoryTable::Version) => {
                for (old, new) in rows {
                    self.update_version_row(old, new)?;
                }
            }
            Target::History(HistoryTable::ActiveVersion) => {
                for (_, new) in rows {
                    let id = column_text(&new, "version_id").ok_or_else(|| {
                        invalid_column("active_version", "version_id", "cannot be NULL")
                    })?;
                    self.switch_version(&VersionId::new(id))?;
                }
            }
            Target::History(_) | Target::Cache(_) => {
                return Err(TransactionError::ReadOnly(table.to_string()).into())
            }
        }
        Ok(n)
    }

    fn delete(&mut self, table: &str, rows: Vec<Row>) -> LixResult<usize> {
        let n = rows.len();
        match self.target(table)? {
            Target::View { def, .. } => {
                check_view_writable(&def)?;
                for row in rows {
                    self.delete_view_row(&def, row)?;
                }
            }
            Target::State { all } => {
                for row in rows {
                    self.delete_state_row(all, row)?;
                }
            }
            Target::History(HistoryTable::Version) => {
                for row in rows {
                    let id = column_text(&row, "id").ok_or_else(|| {
                        invalid_column("version", "id", "is missing from the matched row")
                    })?;
                    self.delete_version(&VersionId::new(id))?;
                }
            }
            Target::History(_) | Target::Cache(_) => {
                return Err(TransactionError::ReadOnly(table.to_string()).into())
            }
        }
        Ok(n)
    }
}

fn check_view_writable(def: &EntityViewDef) -> LixResult<()> {
    if def.read_only {
        return Err(TransactionError::ReadOnly(def.view_name.clone()).into());
    }
    Ok(())
}

fn invalid_column(table: &str, column: &str, reason: &str) -> LixError {
    TransactionError::InvalidColumn {
        table: table.to_string(),
        column: column.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
