use crate::connection::Credential;
use crate::object_id::ObjectId;
use crate::path_map::PathMap;

/// File mode for a regular, non-executable blob.
pub const MODE_FILE: &str = "100644";

/// Errors returned by a Git Data remote.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status that triggered the error, if the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// GitHub answers a rejected non-forced ref update with 409 or 422.
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409 | 422))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

/// Coordinates and credential for one repository.
#[derive(Debug, Clone)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
    pub credential: Credential,
}

impl RepoTarget {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Repository metadata used by connect and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub default_branch: String,
    pub private: bool,
}

/// One blob in a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: ObjectId,
    pub mode: String,
    /// API location of the blob; empty when the remote has none to offer.
    pub url: String,
}

/// Recursive listing of a commit's tree, blobs only.
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    /// Root tree id, used as `base_tree` when building the next tree.
    pub id: Option<ObjectId>,
    pub entries: std::collections::BTreeMap<String, RemoteEntry>,
    pub truncated: bool,
}

impl RemoteTree {
    pub fn ids(&self) -> PathMap {
        self.entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.id.clone()))
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<&RemoteEntry> {
        self.entries.get(path)
    }
}

/// One entry of a diff tree: a new blob, or a deletion when `id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub path: String,
    pub mode: String,
    pub id: Option<ObjectId>,
}

/// Result of comparing two commits, `base...head`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Commits reachable from head but not from base.
    pub ahead_by: u64,
    /// Commits reachable from base but not from head.
    pub behind_by: u64,
}

/// Low-level Git Data operations against a hosted repository.
///
/// Every call is a stateless request carrying its own target, so the same
/// remote can serve any number of workspaces.
#[async_trait::async_trait]
pub trait GitRemote: Send + Sync {
    /// Repository metadata; the call used to verify access.
    async fn repository(&self, target: &RepoTarget) -> Result<RepoInfo, RemoteError>;

    /// Commit the branch ref points at.
    async fn branch_head(&self, target: &RepoTarget, branch: &str)
    -> Result<ObjectId, RemoteError>;

    /// Full recursive tree of a commit.
    async fn tree(&self, target: &RepoTarget, commit: &ObjectId) -> Result<RemoteTree, RemoteError>;

    /// Raw bytes of a blob listed in a tree.
    async fn blob(&self, target: &RepoTarget, entry: &RemoteEntry) -> Result<Vec<u8>, RemoteError>;

    async fn create_blob(&self, target: &RepoTarget, content: &[u8])
    -> Result<ObjectId, RemoteError>;

    /// Create a tree from `changes`, inheriting every other path from `base_tree`.
    async fn create_tree(
        &self,
        target: &RepoTarget,
        base_tree: Option<&ObjectId>,
        changes: &[TreeChange],
    ) -> Result<ObjectId, RemoteError>;

    async fn create_commit(
        &self,
        target: &RepoTarget,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RemoteError>;

    /// Move an existing branch to `commit` without force.
    async fn update_branch(
        &self,
        target: &RepoTarget,
        branch: &str,
        commit: &ObjectId,
    ) -> Result<(), RemoteError>;

    async fn create_branch(
        &self,
        target: &RepoTarget,
        branch: &str,
        commit: &ObjectId,
    ) -> Result<(), RemoteError>;

    async fn compare(
        &self,
        target: &RepoTarget,
        base: &ObjectId,
        head: &ObjectId,
    ) -> Result<Comparison, RemoteError>;
}
