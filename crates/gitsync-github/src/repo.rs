use serde::Deserialize;

/// Response from `GET /repos/{owner}/{repo}`.
#[derive(Debug, Deserialize)]
pub struct RepoResponse {
    pub default_branch: Option<String>,
    #[serde(default)]
    pub private: bool,
}

/// Response from `GET /repos/{owner}/{repo}/compare/{base}...{head}`.
#[derive(Debug, Deserialize)]
pub struct CompareResponse {
    #[serde(default)]
    pub ahead_by: u64,
    #[serde(default)]
    pub behind_by: u64,
}

/// Error body GitHub attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: Option<String>,
}
