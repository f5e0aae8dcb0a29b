use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::object_id::ObjectId;

/// Path -> object id mapping. Used for the tracked map, the remote listing
/// and the locally computed ids; two entries are equal when their ids are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathMap(BTreeMap<String, ObjectId>);

impl PathMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, id: ObjectId) -> Option<ObjectId> {
        self.0.insert(path.into(), id)
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<ObjectId> {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.0.iter().map(|(path, id)| (path.as_str(), id))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Entries of `self` whose id differs from `baseline` or that `baseline`
    /// lacks entirely.
    pub fn changed_against(&self, baseline: &PathMap) -> Vec<(&str, &ObjectId)> {
        self.iter()
            .filter(|(path, id)| baseline.get(path) != Some(*id))
            .collect()
    }

    /// Paths of `self` that `other` does not contain.
    pub fn missing_from<'a>(&'a self, other: &PathMap) -> Vec<&'a str> {
        self.paths().filter(|path| !other.contains(path)).collect()
    }
}

impl FromIterator<(String, ObjectId)> for PathMap {
    fn from_iter<I: IntoIterator<Item = (String, ObjectId)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
