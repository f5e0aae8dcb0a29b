use crate::connection::{Caller, WorkspaceId};
use crate::error::SyncError;
use crate::files::WorkspaceFiles;

/// The workspace content store: arbitrary text per path, per workspace.
#[async_trait::async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn load_files(&self, workspace: &WorkspaceId) -> Result<WorkspaceFiles, SyncError>;

    /// Replace the whole file set of a workspace.
    async fn save_files(
        &self,
        workspace: &WorkspaceId,
        files: &WorkspaceFiles,
    ) -> Result<(), SyncError>;
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Decides which workspaces a caller may mutate.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, caller: &Caller, workspace: &WorkspaceId)
    -> Result<Access, SyncError>;
}
