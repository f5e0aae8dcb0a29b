use base64::Engine;
use serde::{Deserialize, Serialize};

/// Response from `GET /repos/{owner}/{repo}/git/blobs/{sha}`.
#[derive(Debug, Deserialize)]
pub struct BlobResponse {
    pub content: Option<String>,
    pub encoding: Option<String>,
}

impl BlobResponse {
    /// Raw blob bytes.
    pub fn decode(&self) -> Result<Vec<u8>, String> {
        let content = self
            .content
            .as_deref()
            .ok_or_else(|| "no content in blob response".to_owned())?;

        match self.encoding.as_deref() {
            Some("base64") | None => {
                // GitHub returns base64 with newlines embedded
                let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(&cleaned)
                    .map_err(|e| format!("base64 decode failed: {e}"))
            }
            Some("utf-8") => Ok(content.as_bytes().to_vec()),
            Some(other) => Err(format!("unsupported blob encoding {other:?}")),
        }
    }
}

/// Body of `POST /repos/{owner}/{repo}/git/blobs`.
#[derive(Debug, Serialize)]
pub struct CreateBlobRequest {
    pub content: String,
    pub encoding: &'static str,
}

impl CreateBlobRequest {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
            encoding: "base64",
        }
    }
}
