//! Typed forms of the built-in entities.

use lix_schema::builtin::{self, ACCOUNT, ACTIVE_ACCOUNT, CHANGE_PROPOSAL, CHANGE_SET_LABEL, FILE, KEY_VALUE, LABEL, STORED_SCHEMA};
use lix_schema::LixEntity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn document(key: &str) -> Value {
    builtin::documents()
        .into_iter()
        .find(|doc| doc.get("x-lix-key").and_then(Value::as_str) == Some(key))
        .unwrap_or(Value::Null)
}

macro_rules! builtin_entity {
    ($ty:ty, $key:expr) => {
        impl LixEntity for $ty {
            const SCHEMA_KEY: &'static str = $key;

            fn schema() -> Value {
                document($key)
            }
        }
    };
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

/// Marks an account as active. Untracked, so switching leaves no history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAccount {
    pub account_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetLabel {
    pub change_set_id: String,
    pub label_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Open,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A request to merge one version into another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProposal {
    pub id: String,
    pub source_version_id: String,
    pub target_version_id: String,
    pub status: ProposalStatus,
}

/// A file row. `data` holds the content hex-encoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub path: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A registered schema document, kept so a reopened database can
/// register it again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSchema {
    pub key: String,
    pub version: String,
    pub value: Value,
}

builtin_entity!(Account, ACCOUNT);
builtin_entity!(ActiveAccount, ACTIVE_ACCOUNT);
builtin_entity!(Label, LABEL);
builtin_entity!(ChangeSetLabel, CHANGE_SET_LABEL);
builtin_entity!(KeyValue, KEY_VALUE);
builtin_entity!(ChangeProposal, CHANGE_PROPOSAL);
builtin_entity!(FileRecord, FILE);
builtin_entity!(StoredSchema, STORED_SCHEMA);
