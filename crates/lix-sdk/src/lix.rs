use std::path::Path;
use std::sync::Arc;

use lix_deterministic::Mode;
use lix_pack::{decode_blob, encode_blob, write_blob_file, BlobFile};
use lix_plugin::{Plugin, PluginError, PluginRegistry};
use lix_query::{classify, QueryEngine, QueryOutput, ResultSet, StatementKind};
use lix_refs::{Version, GLOBAL_VERSION_ID};
use lix_schema::builtin::{keys, CHECKPOINT_LABEL, STORED_SCHEMA};
use lix_schema::{LixSchema, RegisterOutcome};
use lix_state::CacheStats;
use lix_types::{LixId, VersionId};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::database::{Database, DatabaseImage, MergeOutcome};
use crate::entities::StoredSchema;
use crate::error::LixResult;
use crate::merge::DatabaseMergeOutcome;
use crate::options::OpenOptions;
use crate::transaction::{Transaction, WriteTarget};

/// An open database.
///
/// All state lives in memory. [`Lix::export`] serialises it into a blob
/// that [`Lix::open`] (or [`Lix::open_file`]) turns back into a database.
pub struct Lix {
    db: Database,
    plugins: PluginRegistry,
    engine: QueryEngine,
}

impl Lix {
    /// Open the blob in `options`, or create a new database.
    ///
    /// A new database gets its id and name key-values, the checkpoint
    /// label and one active account. In deterministic mode the seed is
    /// stored too, so a reopened copy keeps generating the same sequence.
    pub fn open(options: OpenOptions) -> LixResult<Self> {
        let engine = QueryEngine::new(options.query_config());
        if let Some(blob) = &options.blob {
            let (_, image): (_, DatabaseImage) = decode_blob(blob)?;
            return Ok(Self {
                db: Database::from_image(image)?,
                plugins: PluginRegistry::new(),
                engine,
            });
        }

        let mode = Mode::from(options.deterministic.clone());
        let mut lix = Self {
            db: Database::create(mode)?,
            plugins: PluginRegistry::new(),
            engine,
        };
        let lix_id = lix.db.lix_id.clone();
        let account_name = options.account_name.as_deref().unwrap_or("anonymous");
        lix.transaction(|tx| {
            tx.set_key_value(keys::LIX_ID, json!(lix_id.as_str()))?;
            tx.set_key_value(keys::LIX_NAME, json!(default_name(&lix_id)))?;
            if mode.is_deterministic() {
                tx.set_key_value(keys::DETERMINISTIC_MODE, mode.to_value())?;
            }
            tx.create_label(CHECKPOINT_LABEL)?;
            let account = tx.create_account(account_name)?;
            tx.switch_account(&account.id)
        })?;
        Ok(lix)
    }

    /// Open a blob file written by [`Lix::export_to_file`].
    pub fn open_file(path: &Path, options: OpenOptions) -> LixResult<Self> {
        let file = BlobFile::open(path)?;
        let image: DatabaseImage = file.decode()?;
        debug!(path = %path.display(), bytes = file.len(), "opened blob file");
        Ok(Self {
            db: Database::from_image(image)?,
            plugins: PluginRegistry::new(),
            engine: QueryEngine::new(options.query_config()),
        })
    }

    pub fn lix_id(&self) -> &LixId {
        &self.db.lix_id
    }

    /// Serialise the committed database.
    pub fn export(&self) -> LixResult<Vec<u8>> {
        Ok(encode_blob(&self.db.lix_id, &self.db.to_image())?)
    }

    pub fn export_to_file(&self, path: &Path) -> LixResult<()> {
        let blob = self.export()?;
        write_blob_file(path, &blob)?;
        info!(path = %path.display(), bytes = blob.len(), "exported database");
        Ok(())
    }

    /// Run `f` as one transaction.
    ///
    /// When `f` returns `Ok`, staged writes are committed. When `f` or the
    /// commit fails, the database is restored to where it was before.
    pub fn transaction<R>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_>) -> LixResult<R>,
    ) -> LixResult<R> {
        let restore = self.db.clone();
        let result = {
            let mut tx = Transaction::new(&mut self.db, &self.plugins, &self.engine);
            f(&mut tx).and_then(|value| {
                tx.db.commit_staged()?;
                Ok(value)
            })
        };
        if let Err(err) = &result {
            warn!(error = %err, "transaction rolled back");
            self.db = restore;
        }
        result
    }

    // ---- Statements ----

    /// Run one SQL statement. Writes run in their own transaction; a SELECT
    /// reads the database in place.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> LixResult<QueryOutput> {
        if classify(sql).kind == StatementKind::Select {
            return self.read(|tx| tx.execute(sql, params));
        }
        self.transaction(|tx| tx.execute(sql, params))
    }

    pub fn select(&mut self, sql: &str, params: &[Value]) -> LixResult<ResultSet> {
        if classify(sql).kind == StatementKind::Select {
            return self.read(|tx| tx.select(sql, params));
        }
        self.transaction(|tx| tx.select(sql, params))
    }

    /// Run `f` without a restore point. Only the state cache may change, and
    /// a rebuilt cache stays valid whether `f` fails or not.
    fn read<R>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> LixResult<R>) -> LixResult<R> {
        let mut tx = Transaction::new(&mut self.db, &self.plugins, &self.engine);
        f(&mut tx)
    }

    /// The SQL a statement is rewritten to before it runs.
    pub fn explain(&mut self, sql: &str) -> LixResult<String> {
        self.read(|tx| {
            let engine = tx.engine;
            engine.explain(tx, sql)
        })
    }

    // ---- Schemas and plugins ----

    /// Register a schema document and store it so reopened copies know it.
    pub fn register_schema(&mut self, value: &Value) -> LixResult<RegisterOutcome> {
        self.transaction(|tx| register_stored(tx, value))
    }

    /// Register a plugin together with the schemas of the entities it emits.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> LixResult<()> {
        if self.plugins.get(plugin.key()).is_some() {
            return Err(PluginError::Duplicate(plugin.key().to_string()).into());
        }
        let documents = plugin.schema_documents();
        self.transaction(|tx| {
            for document in &documents {
                register_stored(tx, document)?;
            }
            Ok(())
        })?;
        self.plugins.register(plugin)?;
        Ok(())
    }

    pub fn schema(&self, key: &str) -> Option<&LixSchema> {
        self.db.registry.get(key)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.db.cache.stats()
    }

    // ---- Versions ----

    pub fn active_version(&self) -> Version {
        self.db.versions.active().clone()
    }

    pub fn versions(&self) -> Vec<Version> {
        self.db.versions.all().cloned().collect()
    }

    pub fn create_version(&mut self, name: Option<&str>, from: Option<&VersionId>) -> LixResult<Version> {
        self.transaction(|tx| tx.create_version(name, from))
    }

    pub fn switch_version(&mut self, id: &VersionId) -> LixResult<()> {
        self.transaction(|tx| tx.switch_version(id))
    }

    pub fn merge_version(&mut self, source: &VersionId, target: &VersionId) -> LixResult<MergeOutcome> {
        self.transaction(|tx| tx.merge_version(source, target))
    }

    pub fn merge_database(&mut self, blob: &[u8]) -> LixResult<DatabaseMergeOutcome> {
        self.transaction(|tx| tx.merge_database(blob))
    }

    // ---- Files ----

    pub fn write_file(&mut self, path: &str, data: &[u8]) -> LixResult<lix_types::FileId> {
        self.transaction(|tx| tx.write_file(path, data))
    }

    pub fn read_file(&mut self, path: &str) -> LixResult<Option<Vec<u8>>> {
        self.transaction(|tx| tx.read_file(path))
    }
}

fn register_stored(tx: &mut Transaction<'_>, value: &Value) -> LixResult<RegisterOutcome> {
    let outcome = tx.db.registry.register_value(value)?;
    if outcome == RegisterOutcome::AlreadyRegistered {
        return Ok(outcome);
    }
    let schema = LixSchema::from_value(value)?;
    let stored = StoredSchema {
        key: schema.key.to_string(),
        version: schema.version.clone(),
        value: value.clone(),
    };
    let content = serde_json::to_value(&stored)
        .map_err(|e| lix_schema::SchemaValidationError::new(STORED_SCHEMA, e.to_string()))?;
    let global = WriteTarget::version(VersionId::new(GLOBAL_VERSION_ID));
    tx.insert_entity(STORED_SCHEMA, content, &global, true)?;
    info!(key = %stored.key, version = %stored.version, "registered schema");
    Ok(outcome)
}

/// `lix-` followed by the first characters of the id.
fn default_name(lix_id: &LixId) -> String {
    let short: String = lix_id.as_str().chars().filter(|c| *c != '-').take(8).collect();
    format!("lix-{short}")
}
