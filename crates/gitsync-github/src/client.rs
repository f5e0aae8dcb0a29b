use gitsync::{
    Comparison, GitRemote, MODE_FILE, ObjectId, RemoteEntry, RemoteError, RemoteTree, RepoInfo,
    RepoTarget, TreeChange,
};
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::blob::{BlobResponse, CreateBlobRequest};
use crate::commit::{CreateCommitRequest, ObjectResponse};
use crate::refs::{CreateRefRequest, RefResponse, UpdateRefRequest};
use crate::repo::{CompareResponse, ErrorResponse, RepoResponse};
use crate::tree::{CreateTreeRequest, NewTreeEntry, TreeResponse};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Configuration for the GitHub Git Data client.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// Overrides `https://api.github.com`, e.g. for GitHub Enterprise or tests.
    pub api_base_url: Option<String>,
    pub user_agent: String,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            user_agent: concat!("gitsync/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// Talks to GitHub's Git Data REST API.
///
/// Holds no per-repository state; each call carries its own target and
/// credential.
pub struct GitHubClient {
    config: GitHubClientConfig,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .map(|base| base.trim_end_matches('/'))
            .unwrap_or(DEFAULT_API_BASE)
    }

    fn repo_url(&self, target: &RepoTarget, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base(),
            target.owner,
            target.repo,
            rest
        )
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        target: &RepoTarget,
    ) -> reqwest::RequestBuilder {
        tracing::debug!(%method, url, "github request");
        self.client
            .request(method, url)
            .header("User-Agent", &self.config.user_agent)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(
                "Authorization",
                format!("Bearer {}", target.credential.expose()),
            )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_owned()
            });

        tracing::debug!(status = status.as_u16(), %message, "github request rejected");
        Err(RemoteError::http(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    /// Only follow blob URLs on the configured API host; the credential is
    /// attached to the request.
    fn blob_url(&self, target: &RepoTarget, entry: &RemoteEntry) -> String {
        let on_api_host = entry
            .url
            .strip_prefix(self.api_base())
            .is_some_and(|rest| rest.starts_with('/'));
        if on_api_host {
            entry.url.clone()
        } else {
            self.repo_url(target, &format!("git/blobs/{}", entry.id))
        }
    }
}

fn parse_id(sha: &str) -> Result<ObjectId, RemoteError> {
    ObjectId::parse(sha).map_err(|e| RemoteError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl GitRemote for GitHubClient {
    async fn repository(&self, target: &RepoTarget) -> Result<RepoInfo, RemoteError> {
        let url = format!("{}/repos/{}/{}", self.api_base(), target.owner, target.repo);
        let response: RepoResponse = self
            .send_json(self.build_request(Method::GET, &url, target))
            .await?;

        Ok(RepoInfo {
            default_branch: response.default_branch.unwrap_or_else(|| "main".to_owned()),
            private: response.private,
        })
    }

    async fn branch_head(
        &self,
        target: &RepoTarget,
        branch: &str,
    ) -> Result<ObjectId, RemoteError> {
        let url = self.repo_url(target, &format!("git/ref/heads/{branch}"));
        let response: RefResponse = self
            .send_json(self.build_request(Method::GET, &url, target))
            .await?;
        parse_id(&response.object.sha)
    }

    async fn tree(&self, target: &RepoTarget, commit: &ObjectId) -> Result<RemoteTree, RemoteError> {
        let url = self.repo_url(target, &format!("git/trees/{commit}?recursive=1"));
        let response: TreeResponse = self
            .send_json(self.build_request(Method::GET, &url, target))
            .await?;

        let mut entries = std::collections::BTreeMap::new();
        for entry in response.tree {
            // Directories are implied by paths; submodules are not ours to sync.
            if entry.entry_type != "blob" {
                continue;
            }
            let mode = if entry.mode.is_empty() {
                MODE_FILE.to_owned()
            } else {
                entry.mode
            };
            entries.insert(
                entry.path,
                RemoteEntry {
                    id: parse_id(&entry.sha)?,
                    mode,
                    url: entry.url.unwrap_or_default(),
                },
            );
        }

        if response.truncated {
            tracing::debug!(%commit, entries = entries.len(), "tree listing truncated");
        }

        Ok(RemoteTree {
            id: Some(parse_id(&response.sha)?),
            entries,
            truncated: response.truncated,
        })
    }

    async fn blob(&self, target: &RepoTarget, entry: &RemoteEntry) -> Result<Vec<u8>, RemoteError> {
        let url = self.blob_url(target, entry);
        let response: BlobResponse = self
            .send_json(self.build_request(Method::GET, &url, target))
            .await?;
        response.decode().map_err(RemoteError::Parse)
    }

    async fn create_blob(
        &self,
        target: &RepoTarget,
        content: &[u8],
    ) -> Result<ObjectId, RemoteError> {
        let url = self.repo_url(target, "git/blobs");
        let response: ObjectResponse = self
            .send_json(
                self.build_request(Method::POST, &url, target)
                    .json(&CreateBlobRequest::new(content)),
            )
            .await?;
        parse_id(&response.sha)
    }

    async fn create_tree(
        &self,
        target: &RepoTarget,
        base_tree: Option<&ObjectId>,
        changes: &[TreeChange],
    ) -> Result<ObjectId, RemoteError> {
        let body = CreateTreeRequest {
            base_tree: base_tree.map(ObjectId::as_str),
            tree: changes
                .iter()
                .map(|change| NewTreeEntry {
                    path: &change.path,
                    mode: &change.mode,
                    entry_type: "blob",
                    sha: change.id.as_ref().map(ObjectId::as_str),
                })
                .collect(),
        };

        let url = self.repo_url(target, "git/trees");
        let response: ObjectResponse = self
            .send_json(self.build_request(Method::POST, &url, target).json(&body))
            .await?;
        parse_id(&response.sha)
    }

    async fn create_commit(
        &self,
        target: &RepoTarget,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RemoteError> {
        let body = CreateCommitRequest {
            message,
            tree: tree.as_str(),
            parents: parents.iter().map(ObjectId::as_str).collect(),
        };

        let url = self.repo_url(target, "git/commits");
        let response: ObjectResponse = self
            .send_json(self.build_request(Method::POST, &url, target).json(&body))
            .await?;
        parse_id(&response.sha)
    }

    async fn update_branch(
        &self,
        target: &RepoTarget,
        branch: &str,
        commit: &ObjectId,
    ) -> Result<(), RemoteError> {
        let body = UpdateRefRequest {
            sha: commit.as_str(),
            force: false,
        };

        let url = self.repo_url(target, &format!("git/refs/heads/{branch}"));
        self.send(self.build_request(Method::PATCH, &url, target).json(&body))
            .await?;
        Ok(())
    }

    async fn create_branch(
        &self,
        target: &RepoTarget,
        branch: &str,
        commit: &ObjectId,
    ) -> Result<(), RemoteError> {
        let body = CreateRefRequest {
            reference: format!("refs/heads/{branch}"),
            sha: commit.as_str(),
        };

        let url = self.repo_url(target, "git/refs");
        self.send(self.build_request(Method::POST, &url, target).json(&body))
            .await?;
        Ok(())
    }

    async fn compare(
        &self,
        target: &RepoTarget,
        base: &ObjectId,
        head: &ObjectId,
    ) -> Result<Comparison, RemoteError> {
        let url = self.repo_url(target, &format!("compare/{base}...{head}"));
        let response: CompareResponse = self
            .send_json(self.build_request(Method::GET, &url, target))
            .await?;

        Ok(Comparison {
            ahead_by: response.ahead_by,
            behind_by: response.behind_by,
        })
    }
}
