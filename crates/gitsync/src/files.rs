use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Prefix marking a stored value as base64-encoded binary content.
pub const BINARY_SENTINEL: &str = "__b64__:";

/// Content of a single workspace file.
///
/// Only `Text` takes part in sync. `Binary` entries are carried through
/// untouched so that a pull or an import never loses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    /// Base64 of the raw bytes, without the sentinel prefix.
    Binary(String),
}

impl FileContent {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Classify raw bytes: valid UTF-8 is text, anything else is binary.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(
                base64::engine::general_purpose::STANDARD.encode(e.into_bytes()),
            ),
        }
    }

    /// Parse the stored string form, recognising the binary sentinel.
    pub fn from_stored(stored: String) -> Self {
        match stored.strip_prefix(BINARY_SENTINEL) {
            Some(encoded) => Self::Binary(encoded.to_owned()),
            None => Self::Text(stored),
        }
    }

    /// Stored string form; binary content gets the sentinel prefix.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Binary(encoded) => format!("{BINARY_SENTINEL}{encoded}"),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes as they would be written to disk.
    pub fn to_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
            Self::Binary(encoded) => base64::engine::general_purpose::STANDARD.decode(encoded),
        }
    }
}

impl Serialize for FileContent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_stored())
    }
}

impl<'de> Deserialize<'de> for FileContent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_stored)
    }
}

/// The full content of one workspace: relative path -> file content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceFiles(BTreeMap<String, FileContent>);

impl WorkspaceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: FileContent) -> Option<FileContent> {
        self.0.insert(path.into(), content)
    }

    /// Shorthand for inserting a text file.
    pub fn insert_text(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.0.insert(path.into(), FileContent::Text(content.into()));
    }

    pub fn remove(&mut self, path: &str) -> Option<FileContent> {
        self.0.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&FileContent> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileContent)> {
        self.0.iter().map(|(path, content)| (path.as_str(), content))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, FileContent)> for WorkspaceFiles {
    fn from_iter<I: IntoIterator<Item = (String, FileContent)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for WorkspaceFiles {
    type Item = (String, FileContent);
    type IntoIter = std::collections::btree_map::IntoIter<String, FileContent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Check that a workspace path is relative and forward-slash separated.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path is empty".into());
    }
    if path.starts_with('/') {
        return Err(format!("{path}: must be relative"));
    }
    if path.contains('\\') {
        return Err(format!("{path}: must use forward slashes"));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(format!("{path}: contains an empty, '.' or '..' segment"));
    }
    Ok(())
}
