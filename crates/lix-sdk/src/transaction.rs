//! Transactions and the entity write path.
//!
//! Every write is staged first. Staged rows are visible to reads in the
//! same transaction and become changes and commits only when the
//! transaction finishes without error; on error the database is restored
//! to where the transaction started.

use lix_index::StagedRow;
use lix_plugin::PluginRegistry;
use lix_query::{QueryEngine, QueryOutput, ResultSet};
use lix_schema::{EntityAccessor, Generator, LixEntity, LixSchema};
use lix_types::{ChangeId, EntityId, EntityKey, FileId, StateKey, VersionId};
use serde_json::Value;
use tracing::trace;

use crate::database::{Database, DEFAULT_FILE_ID, OWN_ENTITY_PLUGIN};
use crate::error::{LixError, LixResult, TransactionError};

/// Where a write lands, beyond the entity content itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteTarget {
    /// Requested version. Entities of global schemas always go to `global`.
    pub version_id: VersionId,
    pub file_id: FileId,
    pub plugin_key: String,
    pub untracked: bool,
}

impl WriteTarget {
    pub fn version(version_id: VersionId) -> Self {
        Self {
            version_id,
            file_id: FileId::new(DEFAULT_FILE_ID),
            plugin_key: OWN_ENTITY_PLUGIN.to_string(),
            untracked: false,
        }
    }

    pub fn in_file(mut self, file_id: FileId, plugin_key: impl Into<String>) -> Self {
        self.file_id = file_id;
        self.plugin_key = plugin_key.into();
        self
    }

    pub fn untracked(mut self, untracked: bool) -> Self {
        self.untracked = untracked;
        self
    }
}

/// An open transaction.
///
/// Obtained from [`Lix::transaction`](crate::Lix::transaction). Reads see
/// rows staged earlier in the same transaction.
pub struct Transaction<'a> {
    pub(crate) db: &'a mut Database,
    pub(crate) plugins: &'a PluginRegistry,
    pub(crate) engine: &'a QueryEngine,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        db: &'a mut Database,
        plugins: &'a PluginRegistry,
        engine: &'a QueryEngine,
    ) -> Self {
        Self {
            db,
            plugins,
            engine,
        }
    }

    // ---- Statements ----

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> LixResult<QueryOutput> {
        let engine = self.engine;
        engine.execute(self, sql, params)
    }

    pub fn select(&mut self, sql: &str, params: &[Value]) -> LixResult<ResultSet> {
        Ok(self.execute(sql, params)?.into_rows())
    }

    pub fn active_version_id(&self) -> VersionId {
        self.db.versions.active_id().clone()
    }

    // ---- Typed entities ----

    /// Insert a typed entity into the active version (or `global`).
    pub fn insert<T: LixEntity>(&mut self, value: &T) -> LixResult<EntityKey> {
        let content = EntityAccessor::<T>::bind(&self.db.registry)?.encode(value)?;
        let target = WriteTarget::version(self.active_version_id());
        let key = self.insert_entity(T::SCHEMA_KEY, content, &target, false)?;
        Ok(key.key)
    }

    /// Replace a typed entity's content, inserting it when absent.
    pub fn upsert<T: LixEntity>(&mut self, value: &T) -> LixResult<EntityKey> {
        let accessor = EntityAccessor::<T>::bind(&self.db.registry)?;
        let content = accessor.encode(value)?;
        let entity_id = accessor.entity_id(value)?;
        let version = self.db.home_version(T::SCHEMA_KEY, self.db.versions.active_id());
        let key = EntityKey::new(entity_id, T::SCHEMA_KEY, DEFAULT_FILE_ID).in_version(&version);
        let target = WriteTarget::version(version);
        self.stage(&key, Some(content), &target, false)?;
        Ok(key.key)
    }

    pub fn delete<T: LixEntity>(&mut self, entity_id: &str) -> LixResult<bool> {
        let version = self.db.home_version(T::SCHEMA_KEY, self.db.versions.active_id());
        let key = EntityKey::new(entity_id, T::SCHEMA_KEY, DEFAULT_FILE_ID).in_version(&version);
        let Some(row) = self.db.visible(&key)? else {
            return Ok(false);
        };
        let target = WriteTarget::version(version).untracked(row.untracked);
        self.stage(&key, None, &target, false)?;
        Ok(true)
    }

    pub fn get<T: LixEntity>(&self, entity_id: &str) -> LixResult<Option<T>> {
        self.db.entity(entity_id)
    }

    /// Every visible entity of `T` in the active version (global schemas
    /// resolve through inheritance).
    pub fn all<T: LixEntity>(&self) -> LixResult<Vec<T>> {
        self.db.entities_in(self.db.versions.active_id())
    }

    // ---- Entity writes ----

    /// Insert new content. Fails if the entity is already visible.
    ///
    /// Missing generated properties are filled from the function provider.
    /// `internal` writes may target read-only schemas.
    pub(crate) fn insert_entity(
        &mut self,
        schema_key: &str,
        mut content: Value,
        target: &WriteTarget,
        internal: bool,
    ) -> LixResult<StateKey> {
        let schema = self.db.registry.require(schema_key)?.clone();
        check_writable(&schema, internal)?;
        self.fill_generated(&schema, &mut content);
        let entity_id = entity_id_of(&schema, &content)?;
        let version = self.db.home_version(schema_key, &target.version_id);
        let key = EntityKey::new(entity_id, schema.key.clone(), target.file_id.clone())
            .in_version(&version);

        let untracked = schema.untracked || target.untracked;
        if !untracked {
            if let Some(existing) = self.db.visible(&key)? {
                if !existing.untracked {
                    return Err(TransactionError::UniqueViolation {
                        schema_key: key.key.schema_key,
                        entity_id: key.key.entity_id,
                        version_id: key.version_id,
                    }
                    .into());
                }
            }
        }
        self.stage(&key, Some(content), target, internal)?;
        Ok(key)
    }

    /// Replace the content of the entity at `key`. A changed primary key
    /// moves the entity: the old id is deleted and the new one inserted.
    pub(crate) fn update_entity(
        &mut self,
        key: &StateKey,
        content: Value,
        target: &WriteTarget,
    ) -> LixResult<StateKey> {
        let schema = self.db.registry.require(key.key.schema_key.as_str())?.clone();
        check_writable(&schema, false)?;
        let new_id = entity_id_of(&schema, &content)?;
        if new_id != key.key.entity_id {
            self.stage(key, None, target, false)?;
            return self.insert_entity(schema.key.as_str(), content, target, false);
        }
        self.stage(key, Some(content), target, false)?;
        Ok(key.clone())
    }

    pub(crate) fn delete_entity(&mut self, key: &StateKey, target: &WriteTarget) -> LixResult<()> {
        let schema = self.db.registry.require(key.key.schema_key.as_str())?.clone();
        check_writable(&schema, false)?;
        self.stage(key, None, target, false)
    }

    /// Validate and stage one row. The key's version is final here.
    pub(crate) fn stage(
        &mut self,
        key: &StateKey,
        content: Option<Value>,
        target: &WriteTarget,
        internal: bool,
    ) -> LixResult<()> {
        let schema = self.db.registry.require(key.key.schema_key.as_str())?.clone();
        check_writable(&schema, internal)?;
        if let Some(content) = &content {
            self.db
                .registry
                .validate(schema.key.as_str(), &schema.version, content)?;
            self.check_foreign_keys(&schema, &key.key.entity_id, &key.version_id, content)?;
        }
        let row = StagedRow {
            key: key.clone(),
            schema_version: schema.version.clone(),
            plugin_key: target.plugin_key.clone(),
            content,
            untracked: schema.untracked || target.untracked,
            change_id: ChangeId::new(self.db.provider.uuid_v7()),
            created_at: self.db.provider.timestamp(),
        };
        trace!(key = %key.key, version = %key.version_id, deletion = row.is_deletion(), "staged row");
        self.db.staging.stage(row)?;
        Ok(())
    }

    pub(crate) fn fill_generated(&mut self, schema: &LixSchema, content: &mut Value) {
        let Some(object) = content.as_object_mut() else {
            return;
        };
        for (property, generator) in schema.generated_properties() {
            if object.get(property).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let value = match generator {
                Generator::UuidV7 => self.db.provider.uuid_v7(),
                Generator::NanoId => self.db.provider.nano_id(),
                Generator::Timestamp => self.db.provider.timestamp().to_iso(),
            };
            object.insert(property.to_string(), Value::String(value));
        }
    }

    fn check_foreign_keys(
        &self,
        schema: &LixSchema,
        entity_id: &EntityId,
        version_id: &VersionId,
        content: &Value,
    ) -> LixResult<()> {
        for fk in &schema.foreign_keys {
            let mut parts = Vec::with_capacity(fk.properties.len());
            for property in &fk.properties {
                match content.get(property) {
                    None | Some(Value::Null) => break,
                    Some(Value::String(s)) => parts.push(s.clone()),
                    Some(other) => parts.push(other.to_string()),
                }
            }
            if parts.len() != fk.properties.len() {
                continue;
            }
            let referenced_id = parts.join("~");
            let version = self.db.home_version(fk.references_schema.as_str(), version_id);
            let key = EntityKey::new(
                referenced_id.as_str(),
                fk.references_schema.clone(),
                DEFAULT_FILE_ID,
            )
            .in_version(&version);
            if self.db.visible(&key)?.is_none() {
                return Err(TransactionError::ForeignKeyViolation {
                    schema_key: schema.key.clone(),
                    entity_id: entity_id.clone(),
                    references: fk.references_schema.clone(),
                    referenced_id,
                }
                .into());
            }
        }
        Ok(())
    }
}

fn check_writable(schema: &LixSchema, internal: bool) -> LixResult<()> {
    if schema.read_only && !internal {
        return Err(TransactionError::ReadOnly(schema.key.to_string()).into());
    }
    Ok(())
}

fn entity_id_of(schema: &LixSchema, content: &Value) -> LixResult<EntityId> {
    schema
        .entity_id_of(content)
        .map(EntityId::new)
        .ok_or_else(|| {
            LixError::from(TransactionError::MissingPrimaryKey {
                schema_key: schema.key.clone(),
            })
        })
}
