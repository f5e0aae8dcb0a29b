use serde::{Deserialize, Serialize};

/// Body of `POST /repos/{owner}/{repo}/git/commits`.
#[derive(Debug, Serialize)]
pub struct CreateCommitRequest<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: Vec<&'a str>,
}

/// Any Git Data response that names the object it created.
#[derive(Debug, Deserialize)]
pub struct ObjectResponse {
    pub sha: String,
}
