//! Files and the plugins that interpret them.
//!
//! A file is a `lix_file` entity whose `data` column holds the content
//! hex-encoded. Writing one also hands the old and new content to the
//! plugin owning the path; the entities it detects are staged with the
//! file's id as their `file_id` and the plugin's key as their
//! `plugin_key`.

use lix_plugin::FileData;
use lix_schema::builtin::FILE;
use lix_schema::SchemaValidationError;
use lix_state::{StateFilter, StateRow};
use lix_types::{EntityKey, FileId, StateKey, VersionId};
use serde_json::Value;
use tracing::debug;

use crate::database::DEFAULT_FILE_ID;
use crate::entities::FileRecord;
use crate::error::LixResult;
use crate::transaction::{Transaction, WriteTarget};

impl Transaction<'_> {
    /// Write `data` at `path` in the active version, creating the file or
    /// replacing its content.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> LixResult<FileId> {
        let version = self.active_version_id();
        let existing = self.file_row_by_path(&version, path)?;
        let target = WriteTarget::version(version.clone());
        match existing {
            Some(row) => {
                let mut content = row.snapshot_content.clone();
                if let Some(object) = content.as_object_mut() {
                    object.insert("data".into(), Value::String(hex::encode(data)));
                }
                let key = row.key.in_version(&version);
                self.update_file(&key, content, &target)?;
                Ok(row.key.entity_id.as_str().into())
            }
            None => {
                let content = serde_json::json!({ "path": path, "data": hex::encode(data) });
                self.insert_file(content, &target)
            }
        }
    }

    /// Content of the file at `path` in the active version.
    pub fn read_file(&self, path: &str) -> LixResult<Option<Vec<u8>>> {
        match self.file_row_by_path(self.db.versions.active_id(), path)? {
            Some(row) => Ok(Some(decode_data(&row.snapshot_content)?.data)),
            None => Ok(None),
        }
    }

    /// Every file visible in the active version.
    pub fn files(&self) -> LixResult<Vec<FileRecord>> {
        self.all::<FileRecord>()
    }

    /// Delete the file at `path` and every entity it owns. Returns whether
    /// a file was there.
    pub fn delete_file(&mut self, path: &str) -> LixResult<bool> {
        let version = self.active_version_id();
        let Some(row) = self.file_row_by_path(&version, path)? else {
            return Ok(false);
        };
        let key = row.key.in_version(&version);
        let target = WriteTarget::version(version).untracked(row.untracked);
        self.delete_file_at(&key, &target)?;
        Ok(true)
    }

    // ---- Write path shared with the file view ----

    pub(crate) fn insert_file(&mut self, mut content: Value, target: &WriteTarget) -> LixResult<FileId> {
        let schema = self.db.registry.require(FILE)?.clone();
        self.fill_generated(&schema, &mut content);
        let after = decode_data(&content)?;
        let key = self.insert_entity(FILE, content, target, false)?;
        self.detect(None, &after, &key.version_id)?;
        Ok(after.id)
    }

    pub(crate) fn update_file(
        &mut self,
        key: &StateKey,
        content: Value,
        target: &WriteTarget,
    ) -> LixResult<()> {
        let before = match self.db.visible(key)? {
            Some(row) => Some(decode_data(&row.snapshot_content)?),
            None => None,
        };
        let after = decode_data(&content)?;
        if after.id.as_str() != key.key.entity_id.as_str() {
            // A new id is a new file: the old one goes with its entities.
            self.delete_file_at(key, target)?;
            self.insert_file(content, target)?;
            return Ok(());
        }
        self.update_entity(key, content, target)?;
        self.detect(before.as_ref(), &after, &key.version_id)
    }

    pub(crate) fn delete_file_at(&mut self, key: &StateKey, target: &WriteTarget) -> LixResult<()> {
        let file_id = FileId::new(key.key.entity_id.as_str());
        let owned: Vec<StateRow> = self
            .db
            .resolved_rows(&StateFilter::version(key.version_id.clone()))?
            .into_iter()
            .filter(|row| row.key.file_id == file_id)
            .collect();
        debug!(file = %file_id, entities = owned.len(), "deleting file");
        for row in owned {
            let owned_key = row.key.in_version(&key.version_id);
            let owned_target = WriteTarget::version(key.version_id.clone())
                .in_file(file_id.clone(), row.plugin_key.clone())
                .untracked(row.untracked);
            self.stage(&owned_key, None, &owned_target, false)?;
        }
        self.delete_entity(key, target)
    }

    fn detect(&mut self, before: Option<&FileData>, after: &FileData, version: &VersionId) -> LixResult<()> {
        let plugins = self.plugins;
        let Some((plugin, changes)) = plugins.detect(before, after)? else {
            return Ok(());
        };
        for change in changes {
            let home = self.db.home_version(change.schema_key.as_str(), version);
            let key = EntityKey::new(change.entity_id, change.schema_key, after.id.clone())
                .in_version(&home);
            let target = WriteTarget::version(home).in_file(after.id.clone(), plugin.key());
            if change.snapshot_content.is_none() && self.db.visible(&key)?.is_none() {
                continue;
            }
            self.stage(&key, change.snapshot_content, &target, false)?;
        }
        Ok(())
    }

    fn file_row_by_path(&self, version: &VersionId, path: &str) -> LixResult<Option<StateRow>> {
        let filter = StateFilter::version(version.clone()).with_schema(FILE);
        Ok(self
            .db
            .resolved_rows(&filter)?
            .into_iter()
            .find(|row| {
                row.key.file_id.as_str() == DEFAULT_FILE_ID
                    && row.snapshot_content.get("path").and_then(Value::as_str) == Some(path)
            }))
    }
}

/// The plugin-facing form of a file row, with `data` decoded.
fn decode_data(content: &Value) -> LixResult<FileData> {
    let record: FileRecord = serde_json::from_value(content.clone()).map_err(|e| {
        SchemaValidationError::new(FILE, format!("not a file row: {e}"))
    })?;
    let data = hex::decode(&record.data)
        .map_err(|e| SchemaValidationError::new(FILE, format!("data is not hex: {e}")).at("data"))?;
    Ok(FileData {
        id: FileId::new(record.id),
        path: record.path,
        data,
    })
}
