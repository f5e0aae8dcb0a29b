use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;
use crate::object_id::ObjectId;
use crate::path_map::PathMap;
use crate::remote::RepoTarget;

/// Identifier of a server-managed workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of whoever is asking for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller(String);

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access token for the remote. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Per-workspace remote target plus the sync cursor.
#[derive(Debug, Clone)]
pub struct Connection {
    pub workspace_id: WorkspaceId,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub credential: Credential,
    /// Commit the workspace was last pushed to or pulled from.
    pub last_commit_sha: Option<ObjectId>,
    /// What the remote held for each path as of the last sync.
    pub tracked_map: PathMap,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// A fresh connection with no sync history.
    pub fn new(
        workspace_id: WorkspaceId,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            workspace_id,
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            credential,
            last_commit_sha: None,
            tracked_map: PathMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn target(&self) -> RepoTarget {
        RepoTarget {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            credential: self.credential.clone(),
        }
    }

    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            workspace_id: self.workspace_id.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            last_commit_sha: self.last_commit_sha.clone(),
            tracked_files: self.tracked_map.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Connection details safe to hand back to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub workspace_id: WorkspaceId,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub last_commit_sha: Option<ObjectId>,
    pub tracked_files: usize,
    pub updated_at: DateTime<Utc>,
}

/// Persistence for connection records, one per workspace.
#[async_trait::async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn load(&self, workspace: &WorkspaceId) -> Result<Option<Connection>, SyncError>;

    /// Insert or replace the record for `connection.workspace_id`.
    async fn save(&self, connection: &Connection) -> Result<(), SyncError>;

    /// Remove the record. Returns whether one existed.
    async fn delete(&self, workspace: &WorkspaceId) -> Result<bool, SyncError>;

    /// Store the outcome of a successful push or pull.
    async fn record_sync(
        &self,
        workspace: &WorkspaceId,
        head: &ObjectId,
        tracked_map: &PathMap,
    ) -> Result<(), SyncError>;
}
