//! Calls that cross the environment boundary.
//!
//! A call is plain data so that it can be queued to an actor or sent over
//! any channel; its reply is JSON.

use lix_sdk::{Lix, QueryOutput, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EnvironmentError, EnvironmentResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    /// Run one SQL statement. Reads answer `{columns, rows}`, writes
    /// `{affected}`.
    Execute {
        sql: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    Explain {
        sql: String,
    },
    Versions,
    ActiveVersion,
    CreateVersion {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        from: Option<VersionId>,
    },
    SwitchVersion {
        version_id: VersionId,
    },
    MergeVersion {
        source: VersionId,
        target: VersionId,
    },
    /// Merge another copy of the database, given as an exported blob.
    MergeDatabase {
        blob: Vec<u8>,
    },
    CacheStats,
}

impl Call {
    /// Short name for logs.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Execute { .. } => "execute",
            Self::Explain { .. } => "explain",
            Self::Versions => "versions",
            Self::ActiveVersion => "active_version",
            Self::CreateVersion { .. } => "create_version",
            Self::SwitchVersion { .. } => "switch_version",
            Self::MergeVersion { .. } => "merge_version",
            Self::MergeDatabase { .. } => "merge_database",
            Self::CacheStats => "cache_stats",
        }
    }

    /// Run the call against an open database.
    pub(crate) fn apply(self, lix: &mut Lix) -> EnvironmentResult<Value> {
        match self {
            Self::Execute { sql, params } => match lix.execute(&sql, &params)? {
                QueryOutput::Rows(rows) => to_json(&rows),
                QueryOutput::Affected(n) => Ok(json!({ "affected": n })),
            },
            Self::Explain { sql } => Ok(Value::String(lix.explain(&sql)?)),
            Self::Versions => to_json(&lix.versions()),
            Self::ActiveVersion => to_json(&lix.active_version()),
            Self::CreateVersion { name, from } => {
                to_json(&lix.create_version(name.as_deref(), from.as_ref())?)
            }
            Self::SwitchVersion { version_id } => {
                lix.switch_version(&version_id)?;
                Ok(Value::Null)
            }
            Self::MergeVersion { source, target } => to_json(&lix.merge_version(&source, &target)?),
            Self::MergeDatabase { blob } => to_json(&lix.merge_database(&blob)?),
            Self::CacheStats => to_json(&lix.cache_stats()),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> EnvironmentResult<Value> {
    serde_json::to_value(value).map_err(|e| EnvironmentError::Serialization(e.to_string()))
}

/// Decode a call reply into `T`.
pub fn from_reply<T: serde::de::DeserializeOwned>(reply: Value) -> EnvironmentResult<T> {
    serde_json::from_value(reply).map_err(|e| EnvironmentError::Serialization(e.to_string()))
}
