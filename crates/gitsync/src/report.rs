use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::files::WorkspaceFiles;
use crate::object_id::ObjectId;

/// What a push or pull ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    UpToDate,
    Pushed,
    Pulled,
}

/// Outcome of one push or pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    /// Branch head after the operation.
    pub head: ObjectId,
    pub files_changed: usize,
    pub files_uploaded: usize,
    pub files_downloaded: usize,
    pub files_deleted: usize,
    /// Files tracked after the operation.
    pub total_files: usize,
}

impl SyncResult {
    pub fn up_to_date(head: ObjectId, total_files: usize) -> Self {
        Self {
            status: SyncStatus::UpToDate,
            head,
            files_changed: 0,
            files_uploaded: 0,
            files_downloaded: 0,
            files_deleted: 0,
            total_files,
        }
    }
}

/// Merged file set returned by a pull.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub files: WorkspaceFiles,
    pub result: SyncResult,
}

/// Returned by a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectInfo {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub default_branch: String,
    pub private: bool,
}

/// Read-only comparison of the tracked head against the remote head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub head_tracked: Option<ObjectId>,
    pub head_remote: Option<ObjectId>,
    pub up_to_date: Option<bool>,
    /// Commits on the remote branch that the tracked head lacks.
    pub behind_by: Option<u64>,
    pub private: Option<bool>,
    pub repo_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Set when the remote could not be reached; the other fields still
    /// describe the stored connection.
    pub error: Option<String>,
}

impl StatusReport {
    pub fn disconnected() -> Self {
        Self::default()
    }
}
