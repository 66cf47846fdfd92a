use lix_types::{ChangeSetId, CommitId, VersionId};
use serde::{Deserialize, Serialize};

/// Id of the version that holds engine-wide entities.
pub const GLOBAL_VERSION_ID: &str = "global";

/// Name of the version created at initialisation.
pub const MAIN_VERSION_NAME: &str = "main";

/// A movable, named pointer into the commit graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub name: String,
    pub commit_id: CommitId,
    /// Collects the changes committed since the last checkpoint.
    pub working_change_set_id: ChangeSetId,
    /// Entities without a local change are read from this version.
    pub inherited_from_version_id: Option<VersionId>,
    /// Hidden versions are not listed by default (the global version).
    pub hidden: bool,
}

impl Version {
    pub fn is_global(&self) -> bool {
        self.id.as_str() == GLOBAL_VERSION_ID
    }
}
