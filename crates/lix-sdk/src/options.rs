use lix_deterministic::DeterministicConfig;
use lix_query::QueryConfig;
use serde::{Deserialize, Serialize};

/// How to open a database.
///
/// Deserialisable so hosts can keep it in their own configuration files.
/// The blob to open is supplied at runtime only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Seeded, reproducible ids and timestamps. `None` means live mode.
    pub deterministic: Option<DeterministicConfig>,
    /// `false` runs every read without the rewrite pipeline.
    pub rewrite_enabled: bool,
    /// Name of the account created and activated for a new database.
    pub account_name: Option<String>,
    /// An exported database to open instead of creating a new one.
    #[serde(skip)]
    pub blob: Option<Vec<u8>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            deterministic: None,
            rewrite_enabled: true,
            account_name: None,
            blob: None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deterministic(mut self, seed: u64) -> Self {
        self.deterministic = Some(DeterministicConfig { seed });
        self
    }

    pub fn rewrite_enabled(mut self, enabled: bool) -> Self {
        self.rewrite_enabled = enabled;
        self
    }

    pub fn account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = Some(name.into());
        self
    }

    pub fn blob(mut self, blob: Vec<u8>) -> Self {
        self.blob = Some(blob);
        self
    }

    pub(crate) fn query_config(&self) -> QueryConfig {
        QueryConfig {
            rewrite_enabled: self.rewrite_enabled,
        }
    }
}
