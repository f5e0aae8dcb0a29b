pub mod audit;
pub mod batch;
pub mod connection;
pub mod engine;
pub mod error;
pub mod files;
pub mod object_id;
pub mod path_map;
pub mod remote;
pub mod report;
pub mod workspace;

pub use audit::{AuditSink, SyncOperation};
pub use batch::{DEFAULT_BATCH_SIZE, run_batched};
pub use connection::{
    Caller, Connection, ConnectionStore, ConnectionSummary, Credential, WorkspaceId,
};
pub use engine::{ConnectRequest, SyncEngine};
pub use error::SyncError;
pub use files::{BINARY_SENTINEL, FileContent, WorkspaceFiles, validate_path};
pub use object_id::{InvalidObjectId, ObjectId, content_id};
pub use path_map::PathMap;
pub use remote::{
    Comparison, GitRemote, MODE_FILE, RemoteEntry, RemoteError, RemoteTree, RepoInfo,
    RepoTarget, TreeChange,
};
pub use report::{ConnectInfo, PullOutcome, StatusReport, SyncResult, SyncStatus};
pub use workspace::{Access, Authorizer, WorkspaceStore};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
