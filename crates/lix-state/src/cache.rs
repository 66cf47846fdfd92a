use std::collections::BTreeMap;

use lix_types::{EntityKey, SchemaKey, StateKey, VersionId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::resolve::{History, HistoryResolver, LocalSource};
use crate::row::LocalEntry;

/// Prefix of the physical per-schema cache tables.
pub const CACHE_TABLE_PREFIX: &str = "internal_state_cache";

/// Name of the cache table holding rows of `schema_key`.
pub fn cache_table_name(schema_key: &str) -> String {
    format!("{CACHE_TABLE_PREFIX}_{schema_key}")
}

/// Counters describing the cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Full rebuilds since the cache was created.
    pub rebuilds: u64,
    /// Rows currently materialised, tombstones included.
    pub rows: usize,
    /// Number of per-schema tables.
    pub tables: usize,
    pub stale: bool,
}

/// Materialised local state of every version, one table per schema.
///
/// Tombstones are cached too so that a local deletion keeps hiding the
/// inherited value. Any write that moves a version or adds history marks the
/// whole cache stale; the next read through [`StateCache::ensure_fresh`]
/// rebuilds every table from history.
#[derive(Clone, Debug)]
pub struct StateCache {
    tables: BTreeMap<SchemaKey, BTreeMap<StateKey, LocalEntry>>,
    stale: bool,
    rebuilds: u64,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    /// An empty cache. It starts stale so the first read populates it.
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            stale: true,
            rebuilds: 0,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        if !self.stale {
            debug!("state cache marked stale");
            self.stale = true;
        }
    }

    /// Rebuild from history if stale.
    ///
    /// On failure the cache stays stale and the previous tables are kept.
    pub fn ensure_fresh(&mut self, history: History<'_>) -> StateResult<()> {
        if !self.stale {
            return Ok(());
        }
        let resolver = HistoryResolver::new(history);
        let mut tables: BTreeMap<SchemaKey, BTreeMap<StateKey, LocalEntry>> = BTreeMap::new();
        for version in history.versions.all() {
            for (key, entry) in resolver.local(&version.id, None)? {
                tables
                    .entry(key.schema_key.clone())
                    .or_default()
                    .insert(key.in_version(&version.id), entry);
            }
        }
        self.tables = tables;
        self.stale = false;
        self.rebuilds += 1;
        info!(
            tables = self.tables.len(),
            rows = self.row_count(),
            rebuilds = self.rebuilds,
            "rebuilt state cache"
        );
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            rebuilds: self.rebuilds,
            rows: self.row_count(),
            tables: self.tables.len(),
            stale: self.stale,
        }
    }

    /// Names of the per-schema tables currently present.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().map(|k| cache_table_name(k.as_str())).collect()
    }

    /// Rows of one schema table across all versions.
    pub fn table(&self, schema_key: &SchemaKey) -> StateResult<Vec<(&VersionId, &LocalEntry)>> {
        self.check()?;
        Ok(self
            .tables
            .get(schema_key)
            .map(|t| t.iter().map(|(k, e)| (&k.version_id, e)).collect())
            .unwrap_or_default())
    }

    /// Every cached row across all tables.
    pub fn rows(&self) -> StateResult<Vec<(&VersionId, &LocalEntry)>> {
        self.check()?;
        Ok(self
            .tables
            .values()
            .flat_map(|t| t.iter().map(|(k, e)| (&k.version_id, e)))
            .collect())
    }

    fn row_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    fn check(&self) -> StateResult<()> {
        if self.stale {
            Err(StateError::Stale)
        } else {
            Ok(())
        }
    }
}

impl LocalSource for StateCache {
    fn local(
        &self,
        version_id: &VersionId,
        schema: Option<&SchemaKey>,
    ) -> StateResult<BTreeMap<EntityKey, LocalEntry>> {
        self.check()?;
        let mut out = BTreeMap::new();
        let tables: Vec<&BTreeMap<StateKey, LocalEntry>> = match schema {
            Some(key) => self.tables.get(key).into_iter().collect(),
            None => self.tables.values().collect(),
        };
        for table in tables {
            for (key, entry) in table.iter().filter(|(k, _)| k.version_id == *version_id) {
                out.insert(key.key.clone(), entry.clone());
            }
        }
        Ok(out)
    }
}
