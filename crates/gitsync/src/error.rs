use crate::connection::WorkspaceId;
use crate::remote::RemoteError;

/// Errors surfaced by sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("workspace {0} is not connected to a repository")]
    NotConnected(WorkspaceId),

    #[error("{caller} may not access workspace {workspace}")]
    Forbidden { caller: String, workspace: WorkspaceId },

    #[error("cannot access repository: {0}")]
    Connection(RemoteError),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(RemoteError),

    #[error("branch {0} not found")]
    BranchNotFound(String),

    #[error("branch {branch} moved since it was read; pull and retry")]
    ConcurrentUpdate { branch: String, source: RemoteError },

    #[error("transfer of {path} failed: {source}")]
    PartialBatchFailure { path: String, source: RemoteError },

    #[error("invalid path {0}")]
    InvalidPath(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// HTTP status of the remote response behind this error, if any.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Self::Connection(e) | Self::RemoteUnavailable(e) => e.status(),
            Self::ConcurrentUpdate { source, .. } | Self::PartialBatchFailure { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }

    /// Whether retrying the same call later may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable(_) | Self::PartialBatchFailure { .. }
        )
    }
}
