use std::collections::{BTreeMap, HashSet};

use lix_types::{ChangeSetId, CommitId, VersionId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{VersionError, VersionResult};
use crate::names::validate_version_name;
use crate::version::{Version, GLOBAL_VERSION_ID};

/// Serialisable form of a [`VersionStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionImage {
    pub versions: Vec<Version>,
    pub active_version_id: VersionId,
}

/// All versions plus the active-version pointer.
///
/// The active version is a single value, so replacing it is the
/// delete-then-insert of one row: there is never a moment with zero or two
/// active versions.
#[derive(Clone, Debug)]
pub struct VersionStore {
    versions: BTreeMap<VersionId, Version>,
    active: VersionId,
}

impl VersionStore {
    /// Create a store holding `initial` versions with `active` selected.
    pub fn new(initial: Vec<Version>, active: VersionId) -> VersionResult<Self> {
        let mut store = Self {
            versions: BTreeMap::new(),
            active: active.clone(),
        };
        for version in initial {
            store.insert(version)?;
        }
        if !store.versions.contains_key(&active) {
            return Err(VersionError::NotFound(active));
        }
        Ok(store)
    }

    pub fn from_image(image: VersionImage) -> VersionResult<Self> {
        Self::new(image.versions, image.active_version_id)
    }

    pub fn to_image(&self) -> VersionImage {
        VersionImage {
            versions: self.versions.values().cloned().collect(),
            active_version_id: self.active.clone(),
        }
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn get(&self, id: &VersionId) -> Option<&Version> {
        self.versions.get(id)
    }

    pub fn require(&self, id: &VersionId) -> VersionResult<&Version> {
        self.versions
            .get(id)
            .ok_or_else(|| VersionError::NotFound(id.clone()))
    }

    pub fn by_name(&self, name: &str) -> VersionResult<&Version> {
        self.versions
            .values()
            .find(|v| v.name == name)
            .ok_or_else(|| VersionError::NameNotFound(name.to_string()))
    }

    pub fn contains(&self, id: &VersionId) -> bool {
        self.versions.contains_key(id)
    }

    /// All versions ordered by id, including hidden ones.
    pub fn all(&self) -> impl Iterator<Item = &Version> {
        self.versions.values()
    }

    /// Versions that are not hidden.
    pub fn visible(&self) -> impl Iterator<Item = &Version> {
        self.versions.values().filter(|v| !v.hidden)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    // ---------------------------------------------------------------
    // Active version
    // ---------------------------------------------------------------

    pub fn active_id(&self) -> &VersionId {
        &self.active
    }

    pub fn active(&self) -> &Version {
        // The constructor and `switch` only ever select existing versions,
        // and the active version cannot be deleted.
        &self.versions[&self.active]
    }

    /// Make `id` the active version. Only the pointer moves.
    pub fn switch(&mut self, id: &VersionId) -> VersionResult<()> {
        if !self.versions.contains_key(id) {
            return Err(VersionError::NotFound(id.clone()));
        }
        if self.active != *id {
            info!(from = %self.active, to = %id, "switched active version");
            self.active = id.clone();
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add a new version.
    pub fn insert(&mut self, version: Version) -> VersionResult<()> {
        validate_version_name(&version.name)?;
        if self.versions.contains_key(&version.id) {
            return Err(VersionError::AlreadyExists(version.id));
        }
        if self.versions.values().any(|v| v.name == version.name) {
            return Err(VersionError::NameTaken(version.name));
        }
        if let Some(parent) = &version.inherited_from_version_id {
            if *parent == version.id {
                return Err(VersionError::InheritanceCycle(version.id));
            }
        }
        debug!(version = %version.id, name = %version.name, commit = %version.commit_id, "inserted version");
        self.versions.insert(version.id.clone(), version);
        Ok(())
    }

    /// Move a version to a new commit.
    pub fn set_commit(&mut self, id: &VersionId, commit_id: CommitId) -> VersionResult<()> {
        let version = self.get_mut(id)?;
        version.commit_id = commit_id;
        Ok(())
    }

    pub fn set_working_change_set(
        &mut self,
        id: &VersionId,
        change_set_id: ChangeSetId,
    ) -> VersionResult<()> {
        let version = self.get_mut(id)?;
        version.working_change_set_id = change_set_id;
        Ok(())
    }

    pub fn rename(&mut self, id: &VersionId, name: &str) -> VersionResult<()> {
        validate_version_name(name)?;
        if self.versions.values().any(|v| v.name == name && v.id != *id) {
            return Err(VersionError::NameTaken(name.to_string()));
        }
        let version = self.get_mut(id)?;
        version.name = name.to_string();
        Ok(())
    }

    /// Replace a version record wholesale (used when importing).
    pub fn upsert(&mut self, version: Version) -> VersionResult<()> {
        validate_version_name(&version.name)?;
        if self
            .versions
            .values()
            .any(|v| v.name == version.name && v.id != version.id)
        {
            return Err(VersionError::NameTaken(version.name));
        }
        let id = version.id.clone();
        let previous = self.versions.insert(id.clone(), version);
        if let Err(err) = self.check_inheritance() {
            match previous {
                Some(previous) => self.versions.insert(id, previous),
                None => self.versions.remove(&id),
            };
            return Err(err);
        }
        Ok(())
    }

    /// Delete a version.
    ///
    /// The global version, the active version and versions others inherit
    /// from cannot be deleted.
    pub fn delete(&mut self, id: &VersionId) -> VersionResult<Version> {
        if id.as_str() == GLOBAL_VERSION_ID {
            return Err(VersionError::DeleteGlobal);
        }
        if *id == self.active {
            return Err(VersionError::DeleteActive(id.clone()));
        }
        if let Some(dependent) = self
            .versions
            .values()
            .find(|v| v.inherited_from_version_id.as_ref() == Some(id))
        {
            return Err(VersionError::HasDependents {
                version: id.clone(),
                dependent: dependent.id.clone(),
            });
        }
        let removed = self
            .versions
            .remove(id)
            .ok_or_else(|| VersionError::NotFound(id.clone()))?;
        info!(version = %id, name = %removed.name, "deleted version");
        Ok(removed)
    }

    /// Ancestors in the inheritance chain, nearest first.
    pub fn inheritance_chain(&self, id: &VersionId) -> VersionResult<Vec<VersionId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id.clone()]);
        let mut current = self.require(id)?.inherited_from_version_id.clone();
        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                return Err(VersionError::InheritanceCycle(parent));
            }
            current = self.require(&parent)?.inherited_from_version_id.clone();
            chain.push(parent);
        }
        Ok(chain)
    }

    fn get_mut(&mut self, id: &VersionId) -> VersionResult<&mut Version> {
        self.versions
            .get_mut(id)
            .ok_or_else(|| VersionError::NotFound(id.clone()))
    }

    fn check_inheritance(&self) -> VersionResult<()> {
        for id in self.versions.keys() {
            self.inheritance_chain(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: &str, name: &str, parent: Option<&str>) -> Version {
        Version {
            id: id.into(),
            name: name.into(),
            commit_id: "c0".into(),
            working_change_set_id: format!("wcs-{id}").into(),
            inherited_from_version_id: parent.map(VersionId::from),
            hidden: false,
        }
    }

    fn store() -> VersionStore {
        VersionStore::new(
            vec![
                version("global", "global", None),
                version("v-main", "main", Some("global")),
            ],
            "v-main".into(),
        )
        .unwrap()
    }

    #[test]
    fn lookup_by_name_and_id() {
        let s = store();
        assert_eq!(s.by_name("main").unwrap().id.as_str(), "v-main");
        assert!(matches!(s.by_name("nope"), Err(VersionError::NameNotFound(_))));
        assert_eq!(s.active().name, "main");
    }

    #[test]
    fn names_are_unique() {
        let mut s = store();
        assert_eq!(
            s.insert(version("v2", "main", None)),
            Err(VersionError::NameTaken("main".into()))
        );
        assert_eq!(
            s.insert(version("v-main", "other", None)),
            Err(VersionError::AlreadyExists("v-main".into()))
        );
    }

    #[test]
    fn switch_moves_pointer_only() {
        let mut s = store();
        s.insert(version("v-f", "feature", Some("global"))).unwrap();
        let before = s.get(&"v-f".into()).cloned();
        s.switch(&"v-f".into()).unwrap();
        assert_eq!(s.active_id().as_str(), "v-f");
        assert_eq!(s.get(&"v-f".into()).cloned(), before);
        assert!(s.switch(&"missing".into()).is_err());
    }

    #[test]
    fn delete_rules() {
        let mut s = store();
        assert_eq!(s.delete(&"global".into()), Err(VersionError::DeleteGlobal));
        assert_eq!(
            s.delete(&"v-main".into()),
            Err(VersionError::DeleteActive("v-main".into()))
        );
        s.insert(version("v-f", "feature", Some("global"))).unwrap();
        s.insert(version("v-g", "child", Some("v-f"))).unwrap();
        assert!(matches!(
            s.delete(&"v-f".into()),
            Err(VersionError::HasDependents { .. })
        ));
        s.delete(&"v-g".into()).unwrap();
        s.delete(&"v-f".into()).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn inheritance_chain_nearest_first() {
        let mut s = store();
        s.insert(version("v-f", "feature", Some("v-main"))).unwrap();
        assert_eq!(
            s.inheritance_chain(&"v-f".into()).unwrap(),
            vec![VersionId::new("v-main"), VersionId::new("global")]
        );
    }

    #[test]
    fn upsert_rejects_cycles() {
        let mut s = store();
        let mut global = s.get(&"global".into()).unwrap().clone();
        global.inherited_from_version_id = Some("v-main".into());
        assert!(matches!(
            s.upsert(global),
            Err(VersionError::InheritanceCycle(_))
        ));
        assert_eq!(s.get(&"global".into()).unwrap().inherited_from_version_id, None);
    }

    #[test]
    fn image_roundtrip() {
        let s = store();
        let json = serde_json::to_string(&s.to_image()).unwrap();
        let restored = VersionStore::from_image(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.to_image(), s.to_image());
    }
}
