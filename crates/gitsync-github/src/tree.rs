use serde::{Deserialize, Serialize};

/// Response from GitHub's Git Trees API.
/// `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1`
#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    pub sha: String,
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// A single entry in the tree.
#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(default)]
    pub mode: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of `POST /repos/{owner}/{repo}/git/trees`.
#[derive(Debug, Serialize)]
pub struct CreateTreeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_tree: Option<&'a str>,
    pub tree: Vec<NewTreeEntry<'a>>,
}

/// One changed path. A `null` sha removes the path from the base tree.
#[derive(Debug, Serialize)]
pub struct NewTreeEntry<'a> {
    pub path: &'a str,
    pub mode: &'a str,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    pub sha: Option<&'a str>,
}
