//! Push, pull, status and connection management for one remote per workspace.

mod pull;
mod push;
mod status;


use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::audit::{AuditSink, SyncOperation};
use crate::batch::DEFAULT_BATCH_SIZE;
use crate::connection::{Caller, Connection, ConnectionStore, ConnectionSummary, Credential, WorkspaceId};
use crate::error::SyncError;
use crate::object_id::ObjectId;
use crate::path_map::PathMap;
use crate::remote::{GitRemote, RemoteError, RemoteTree, RepoTarget};
use crate::report::{ConnectInfo, SyncResult};
use crate::workspace::{Access, Authorizer, WorkspaceStore};

/// Parameters for [`SyncEngine::connect`].
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub owner: String,
    pub repo: String,
    /// Falls back to the repository's default branch when `None` or blank.
    pub branch: Option<String>,
    pub credential: Credential,
}

/// Keeps workspaces in sync with a branch of a hosted Git repository.
pub struct SyncEngine {
    remote: Arc<dyn GitRemote>,
    connections: Arc<dyn ConnectionStore>,
    workspaces: Arc<dyn WorkspaceStore>,
    authorizer: Arc<dyn Authorizer>,
    audit: Option<Arc<dyn AuditSink>>,
    batch_size: usize,
    locks: Mutex<HashMap<WorkspaceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn GitRemote>,
        connections: Arc<dyn ConnectionStore>,
        workspaces: Arc<dyn WorkspaceStore>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            remote,
            connections,
            workspaces,
            authorizer,
            audit: None,
            batch_size: DEFAULT_BATCH_SIZE,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Verify access to a repository and store it as the workspace's remote.
    ///
    /// Replaces any existing connection, discarding its sync history.
    pub async fn connect(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
        request: ConnectRequest,
    ) -> Result<ConnectInfo, SyncError> {
        self.authorize(caller, workspace).await?;
        let _guard = self.lock(workspace).await;

        let target = RepoTarget {
            owner: request.owner.clone(),
            repo: request.repo.clone(),
            credential: request.credential.clone(),
        };
        let info = self
            .remote
            .repository(&target)
            .await
            .map_err(SyncError::Connection)?;

        let branch = request
            .branch
            .map(|b| b.trim().to_owned())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| info.default_branch.clone());

        let connection = Connection::new(
            workspace.clone(),
            &request.owner,
            &request.repo,
            &branch,
            request.credential,
        );
        self.connections.save(&connection).await?;

        tracing::info!(
            workspace = %workspace,
            repo = %target.full_name(),
            branch = %branch,
            "connected"
        );

        Ok(ConnectInfo {
            owner: request.owner,
            repo: request.repo,
            branch,
            default_branch: info.default_branch,
            private: info.private,
        })
    }

    /// The stored connection, without its credential.
    pub async fn connection(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
    ) -> Result<Option<ConnectionSummary>, SyncError> {
        self.authorize(caller, workspace).await?;
        Ok(self
            .connections
            .load(workspace)
            .await?
            .map(|c| c.summary()))
    }

    /// Forget the workspace's remote. Workspace files are left alone.
    pub async fn disconnect(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
    ) -> Result<bool, SyncError> {
        self.authorize(caller, workspace).await?;
        let _guard = self.lock(workspace).await;

        let existed = self.connections.delete(workspace).await?;
        if existed {
            tracing::info!(workspace = %workspace, "disconnected");
        }
        Ok(existed)
    }

    async fn authorize(&self, caller: &Caller, workspace: &WorkspaceId) -> Result<(), SyncError> {
        match self.authorizer.authorize(caller, workspace).await? {
            Access::Allow => Ok(()),
            Access::Deny => Err(SyncError::Forbidden {
                caller: caller.to_string(),
                workspace: workspace.clone(),
            }),
        }
    }

    /// Serializes mutating operations on one workspace.
    ///
    /// Locks nobody holds or waits on are pruned here, so the map only
    /// grows with the number of workspaces in flight.
    async fn lock(&self, workspace: &WorkspaceId) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(workspace.clone()).or_default())
        };
        lock.lock_owned().await
    }

    async fn require_connection(&self, workspace: &WorkspaceId) -> Result<Connection, SyncError> {
        self.connections
            .load(workspace)
            .await?
            .ok_or_else(|| SyncError::NotConnected(workspace.clone()))
    }

    /// Resolve the branch head, treating a missing ref as `None`.
    async fn find_head(
        &self,
        target: &RepoTarget,
        branch: &str,
    ) -> Result<Option<ObjectId>, SyncError> {
        match self.remote.branch_head(target, branch).await {
            Ok(head) => Ok(Some(head)),
            Err(e) if e.is_not_found() => Ok(None),
            // An empty repository has no refs at all.
            Err(e) if e.status() == Some(409) => Err(SyncError::BranchNotFound(branch.to_owned())),
            Err(e) => Err(SyncError::RemoteUnavailable(e)),
        }
    }

    async fn require_head(&self, target: &RepoTarget, branch: &str) -> Result<ObjectId, SyncError> {
        self.find_head(target, branch)
            .await?
            .ok_or_else(|| SyncError::BranchNotFound(branch.to_owned()))
    }

    async fn fetch_tree(
        &self,
        target: &RepoTarget,
        commit: &ObjectId,
    ) -> Result<RemoteTree, SyncError> {
        let tree = self
            .remote
            .tree(target, commit)
            .await
            .map_err(SyncError::RemoteUnavailable)?;

        if tree.truncated {
            tracing::warn!(
                repo = %target.full_name(),
                commit = %commit,
                "tree listing was truncated; unlisted paths are left untouched"
            );
        }

        Ok(tree)
    }

    /// Persist the new sync cursor. A failure here must not turn a completed
    /// sync into an error, so it is only logged.
    async fn record_sync(&self, workspace: &WorkspaceId, head: &ObjectId, tracked: &PathMap) {
        if let Err(e) = self.connections.record_sync(workspace, head, tracked).await {
            tracing::warn!(workspace = %workspace, error = %e, "failed to record sync state");
        }
    }

    async fn audit(&self, workspace: &WorkspaceId, operation: SyncOperation, result: &SyncResult) {
        if let Some(audit) = &self.audit
            && let Err(e) = audit.record(workspace, operation, result).await
        {
            tracing::warn!(workspace = %workspace, %operation, error = %e, "failed to audit sync");
        }
    }
}

fn ref_update_error(branch: &str, error: RemoteError) -> SyncError {
    if error.is_conflict() {
        SyncError::ConcurrentUpdate {
            branch: branch.to_owned(),
            source: error,
        }
    } else {
        SyncError::RemoteUnavailable(error)
    }
}
