use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Hex name of a Git object (blob, tree or commit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse a hex object name. Accepts SHA-1 (40 digits) and SHA-256 (64 digits).
    pub fn parse(hex: &str) -> Result<Self, InvalidObjectId> {
        let trimmed = hex.trim();
        if !matches!(trimmed.len(), 40 | 64) {
            return Err(InvalidObjectId(hex.to_owned()));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidObjectId(hex.to_owned()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display in status lines.
    pub fn short(&self) -> &str {
        &self.0[..7.min(self.0.len())]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id: {0:?}")]
pub struct InvalidObjectId(pub String);

/// Compute the blob id GitHub assigns to `payload`.
///
/// Git hashes `blob <len>\0` followed by the exact bytes. No newline or
/// encoding normalization happens here: any transformation would make every
/// file look modified on the next diff.
pub fn content_id(payload: &[u8]) -> ObjectId {
    let header = format!("blob {}\0", payload.len());
    let mut hasher = Sha1::new();
    hasher.update(header.as_bytes());
    hasher.update(payload);
    ObjectId(format!("{:x}", hasher.finalize()))
}
