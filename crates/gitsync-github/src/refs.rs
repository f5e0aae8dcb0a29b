use serde::{Deserialize, Serialize};

/// Response from `GET /repos/{owner}/{repo}/git/ref/heads/{branch}`.
#[derive(Debug, Deserialize)]
pub struct RefResponse {
    pub object: RefObject,
}

#[derive(Debug, Deserialize)]
pub struct RefObject {
    pub sha: String,
}

/// Body of `PATCH /repos/{owner}/{repo}/git/refs/heads/{branch}`.
#[derive(Debug, Serialize)]
pub struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}

/// Body of `POST /repos/{owner}/{repo}/git/refs`.
#[derive(Debug, Serialize)]
pub struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: &'a str,
}
