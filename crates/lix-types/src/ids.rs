//! String-backed record identifiers.
//!
//! Ids are generated by the deterministic function provider (UUIDv7 or nano
//! ids) or chosen by the caller (entity ids, schema keys). Wrapping them in
//! distinct types keeps a `ChangeId` from being passed where a `CommitId` is
//! expected.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a string without validation.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Wrap a string, rejecting the empty string.
            pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(TypeError::EmptyIdentifier);
                }
                Ok(Self(value))
            }

            /// The underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the underlying string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of an immutable change record.
    ChangeId
);
string_id!(
    /// Identifier of a commit in the version graph.
    CommitId
);
string_id!(
    /// Identifier of a change set.
    ChangeSetId
);
string_id!(
    /// Identifier of a version (branch pointer).
    VersionId
);
string_id!(
    /// Identifier of an account.
    AccountId
);
string_id!(
    /// Identifier of a label.
    LabelId
);
string_id!(
    /// Identifier of a change proposal.
    ChangeProposalId
);
string_id!(
    /// Identifier of a recorded merge conflict.
    ConflictId
);
string_id!(
    /// Identifier of an entity within its schema and file.
    EntityId
);
string_id!(
    /// Identifier of a file.
    FileId
);
string_id!(
    /// Key of a registered schema (`x-lix-key`).
    SchemaKey
);
string_id!(
    /// Identity of a whole database, used by the sync protocol.
    LixId
);
