//! In-memory collaborators for exercising the engine without a network or database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::{
    Access, AuditSink, Authorizer, Caller, Comparison, Connection, ConnectionStore, GitRemote,
    ObjectId, PathMap, RemoteEntry, RemoteError, RemoteTree, RepoInfo, RepoTarget, SyncError,
    SyncOperation, SyncResult, TreeChange, WorkspaceFiles, WorkspaceId, WorkspaceStore,
    content_id,
};

type TreeEntries = BTreeMap<String, (String, ObjectId)>;

#[derive(Debug, Clone)]
struct FakeCommit {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    message: String,
}

#[derive(Default)]
struct RemoteState {
    blobs: HashMap<ObjectId, Vec<u8>>,
    trees: HashMap<ObjectId, TreeEntries>,
    commits: HashMap<ObjectId, FakeCommit>,
    refs: HashMap<String, ObjectId>,
    calls: HashMap<&'static str, usize>,
    tree_requests: Vec<Vec<TreeChange>>,
    failing_uploads: HashSet<Vec<u8>>,
    failing_downloads: HashSet<Vec<u8>>,
    unlisted: HashSet<String>,
    pending_race: Option<Vec<(String, Option<String>)>>,
    unreachable: bool,
    credential: Option<String>,
    sequence: u64,
}

impl RemoteState {
    fn call(&mut self, name: &'static str) -> Result<(), RemoteError> {
        *self.calls.entry(name).or_default() += 1;
        if self.unreachable {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(())
    }

    fn check_credential(&self, target: &RepoTarget) -> Result<(), RemoteError> {
        match &self.credential {
            Some(expected) if expected != target.credential.expose() => {
                Err(RemoteError::http(401, "Bad credentials"))
            }
            _ => Ok(()),
        }
    }

    fn store_tree(&mut self, entries: TreeEntries) -> ObjectId {
        let listing: String = entries
            .iter()
            .map(|(path, (mode, id))| format!("{mode} {id} {path}\n"))
            .collect();
        let id = content_id(format!("tree\n{listing}").as_bytes());
        self.trees.insert(id.clone(), entries);
        id
    }

    fn store_commit(&mut self, tree: ObjectId, parents: Vec<ObjectId>, message: &str) -> ObjectId {
        self.sequence += 1;
        let parent_list: Vec<&str> = parents.iter().map(ObjectId::as_str).collect();
        let id = content_id(
            format!(
                "commit {tree} [{}] {message} #{}",
                parent_list.join(","),
                self.sequence
            )
            .as_bytes(),
        );
        self.commits.insert(
            id.clone(),
            FakeCommit {
                tree,
                parents,
                message: message.to_owned(),
            },
        );
        id
    }

    fn tree_of(&self, commit: &ObjectId) -> Option<&TreeEntries> {
        let commit = self.commits.get(commit)?;
        self.trees.get(&commit.tree)
    }

    fn ancestors(&self, start: &ObjectId) -> HashSet<ObjectId> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&id) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Commit `changes` on top of `branch` as some other client would.
    fn apply_external(&mut self, branch: &str, changes: &[(String, Option<String>)]) -> ObjectId {
        let parent = self.refs.get(branch).cloned();
        let mut entries = parent
            .as_ref()
            .and_then(|p| self.tree_of(p).cloned())
            .unwrap_or_default();

        for (path, content) in changes {
            match content {
                Some(body) => {
                    let id = content_id(body.as_bytes());
                    self.blobs.insert(id.clone(), body.as_bytes().to_vec());
                    entries.insert(path.clone(), ("100644".to_owned(), id));
                }
                None => {
                    entries.remove(path);
                }
            }
        }

        let tree = self.store_tree(entries);
        let commit = self.store_commit(tree, parent.into_iter().collect(), "external change");
        self.refs.insert(branch.to_owned(), commit.clone());
        commit
    }
}

/// A Git Data remote held entirely in memory.
///
/// Blob ids use the same addressing as GitHub. Ref updates are rejected
/// with 422 unless they fast-forward, as a non-forced update would be.
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
    info: RepoInfo,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
            info: RepoInfo {
                default_branch: "main".to_owned(),
                private: true,
            },
        }
    }

    /// Reject every call whose credential differs from `token`.
    pub fn require_credential(self, token: &str) -> Self {
        self.state.lock().unwrap().credential = Some(token.to_owned());
        self
    }

    pub fn with_default_branch(mut self, branch: &str) -> Self {
        self.info.default_branch = branch.to_owned();
        self
    }

    /// Create `branch` with a root commit holding `files`.
    pub fn seed_branch(&self, branch: &str, files: &[(&str, &str)]) -> ObjectId {
        self.commit_external(branch, files)
    }

    /// Commit text files on top of `branch` as another client would.
    pub fn commit_external(&self, branch: &str, files: &[(&str, &str)]) -> ObjectId {
        let changes: Vec<(String, Option<String>)> = files
            .iter()
            .map(|(path, body)| (path.to_string(), Some(body.to_string())))
            .collect();
        self.state.lock().unwrap().apply_external(branch, &changes)
    }

    /// Delete paths on `branch` as another client would.
    pub fn delete_external(&self, branch: &str, paths: &[&str]) -> ObjectId {
        let changes: Vec<(String, Option<String>)> =
            paths.iter().map(|path| (path.to_string(), None)).collect();
        self.state.lock().unwrap().apply_external(branch, &changes)
    }

    /// Store raw bytes at `path` on `branch`, e.g. a binary asset.
    pub fn commit_bytes(&self, branch: &str, path: &str, bytes: &[u8]) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        let id = content_id(bytes);
        state.blobs.insert(id.clone(), bytes.to_vec());
        let parent = state.refs.get(branch).cloned();
        let mut entries = parent
            .as_ref()
            .and_then(|p| state.tree_of(p).cloned())
            .unwrap_or_default();
        entries.insert(path.to_owned(), ("100644".to_owned(), id));
        let tree = state.store_tree(entries);
        let commit = state.store_commit(tree, parent.into_iter().collect(), "binary asset");
        state.refs.insert(branch.to_owned(), commit.clone());
        commit
    }

    /// Before the next ref update lands, move the branch with `files`.
    pub fn race_next_ref_update(&self, files: &[(&str, &str)]) {
        self.state.lock().unwrap().pending_race = Some(
            files
                .iter()
                .map(|(path, body)| (path.to_string(), Some(body.to_string())))
                .collect(),
        );
    }

    /// Make uploads of exactly `content` fail with a server error.
    pub fn fail_uploads_of(&self, content: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(content.as_bytes().to_vec());
    }

    /// Make downloads of blobs holding exactly `content` fail with a server error.
    pub fn fail_downloads_of(&self, content: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_downloads
            .insert(content.as_bytes().to_vec());
    }

    /// Leave `paths` out of every tree listing and report it as truncated,
    /// as GitHub does for trees past its size limit.
    pub fn truncate_listing(&self, paths: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .unlisted
            .extend(paths.iter().map(|path| path.to_string()));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn head(&self, branch: &str) -> Option<ObjectId> {
        self.state.lock().unwrap().refs.get(branch).cloned()
    }

    /// Text content of every file on `branch`.
    pub fn files(&self, branch: &str) -> BTreeMap<String, String> {
        let state = self.state.lock().unwrap();
        let Some(head) = state.refs.get(branch) else {
            return BTreeMap::new();
        };
        state
            .tree_of(head)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(path, (_, id))| {
                        let bytes = state.blobs.get(id).cloned().unwrap_or_default();
                        (path.clone(), String::from_utf8_lossy(&bytes).into_owned())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Path -> blob id for every file on `branch`.
    pub fn blob_ids(&self, branch: &str) -> PathMap {
        let state = self.state.lock().unwrap();
        state
            .refs
            .get(branch)
            .and_then(|head| state.tree_of(head))
            .map(|entries| {
                entries
                    .iter()
                    .map(|(path, (_, id))| (path.clone(), id.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn mode_of(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let head = state.refs.get(branch)?;
        state
            .tree_of(head)?
            .get(path)
            .map(|(mode, _)| mode.clone())
    }

    pub fn parents_of(&self, commit: &ObjectId) -> Vec<ObjectId> {
        self.state
            .lock()
            .unwrap()
            .commits
            .get(commit)
            .map(|c| c.parents.clone())
            .unwrap_or_default()
    }

    pub fn message_of(&self, commit: &ObjectId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .commits
            .get(commit)
            .map(|c| c.message.clone())
    }

    /// Number of calls made to a `GitRemote` method, by method name.
    pub fn calls(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Calls that would write to the remote.
    pub fn write_calls(&self) -> usize {
        ["create_blob", "create_tree", "create_commit", "update_branch", "create_branch"]
            .iter()
            .map(|m| self.calls(m))
            .sum()
    }

    /// Entries of every `create_tree` request, in order.
    pub fn tree_requests(&self) -> Vec<Vec<TreeChange>> {
        self.state.lock().unwrap().tree_requests.clone()
    }
}

#[async_trait::async_trait]
impl GitRemote for InMemoryRemote {
    async fn repository(&self, target: &RepoTarget) -> Result<RepoInfo, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("repository")?;
        state.check_credential(target)?;
        Ok(self.info.clone())
    }

    async fn branch_head(
        &self,
        target: &RepoTarget,
        branch: &str,
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("branch_head")?;
        state.check_credential(target)?;
        state
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::http(404, "Not Found"))
    }

    async fn tree(&self, target: &RepoTarget, commit: &ObjectId) -> Result<RemoteTree, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("tree")?;
        state.check_credential(target)?;
        let tree_id = state
            .commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or_else(|| RemoteError::http(404, "Not Found"))?;
        let entries = state
            .trees
            .get(&tree_id)
            .ok_or_else(|| RemoteError::http(404, "Not Found"))?;

        Ok(RemoteTree {
            entries: entries
                .iter()
                .filter(|(path, _)| !state.unlisted.contains(*path))
                .map(|(path, (mode, id))| {
                    (
                        path.clone(),
                        RemoteEntry {
                            id: id.clone(),
                            mode: mode.clone(),
                            url: format!("memory://blobs/{id}"),
                        },
                    )
                })
                .collect(),
            id: Some(tree_id),
            truncated: !state.unlisted.is_empty(),
        })
    }

    async fn blob(&self, target: &RepoTarget, entry: &RemoteEntry) -> Result<Vec<u8>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("blob")?;
        state.check_credential(target)?;
        let bytes = state
            .blobs
            .get(&entry.id)
            .cloned()
            .ok_or_else(|| RemoteError::http(404, "Not Found"))?;
        if state.failing_downloads.contains(&bytes) {
            return Err(RemoteError::http(502, "Server Error"));
        }
        Ok(bytes)
    }

    async fn create_blob(
        &self,
        target: &RepoTarget,
        content: &[u8],
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("create_blob")?;
        state.check_credential(target)?;
        if state.failing_uploads.contains(content) {
            return Err(RemoteError::http(502, "Server Error"));
        }
        let id = content_id(content);
        state.blobs.insert(id.clone(), content.to_vec());
        Ok(id)
    }

    async fn create_tree(
        &self,
        target: &RepoTarget,
        base_tree: Option<&ObjectId>,
        changes: &[TreeChange],
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("create_tree")?;
        state.check_credential(target)?;
        state.tree_requests.push(changes.to_vec());

        let mut entries = match base_tree {
            Some(base) => state
                .trees
                .get(base)
                .cloned()
                .ok_or_else(|| RemoteError::http(422, "Invalid base_tree"))?,
            None => TreeEntries::new(),
        };

        for change in changes {
            match &change.id {
                Some(id) => {
                    if !state.blobs.contains_key(id) {
                        return Err(RemoteError::http(422, format!("unknown blob {id}")));
                    }
                    entries.insert(change.path.clone(), (change.mode.clone(), id.clone()));
                }
                None => {
                    entries.remove(&change.path);
                }
            }
        }

        Ok(state.store_tree(entries))
    }

    async fn create_commit(
        &self,
        target: &RepoTarget,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("create_commit")?;
        state.check_credential(target)?;
        if !state.trees.contains_key(tree) {
            return Err(RemoteError::http(422, "Tree SHA does not exist"));
        }
        Ok(state.store_commit(tree.clone(), parents.to_vec(), message))
    }

    async fn update_branch(
        &self,
        target: &RepoTarget,
        branch: &str,
        commit: &ObjectId,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("update_branch")?;
        state.check_credential(target)?;

        if let Some(changes) = state.pending_race.take() {
            state.apply_external(branch, &changes);
        }

        let current = state
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::http(422, "Reference does not exist"))?;
        if !state.ancestors(commit).contains(&current) {
            return Err(RemoteError::http(422, "Update is not a fast forward"));
        }
        state.refs.insert(branch.to_owned(), commit.clone());
        Ok(())
    }

    async fn create_branch(
        &self,
        target: &RepoTarget,
        branch: &str,
        commit: &ObjectId,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("create_branch")?;
        state.check_credential(target)?;
        if state.refs.contains_key(branch) {
            return Err(RemoteError::http(422, "Reference already exists"));
        }
        state.refs.insert(branch.to_owned(), commit.clone());
        Ok(())
    }

    async fn compare(
        &self,
        target: &RepoTarget,
        base: &ObjectId,
        head: &ObjectId,
    ) -> Result<Comparison, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.call("compare")?;
        state.check_credential(target)?;
        let from_base = state.ancestors(base);
        let from_head = state.ancestors(head);
        Ok(Comparison {
            ahead_by: from_head.difference(&from_base).count() as u64,
            behind_by: from_base.difference(&from_head).count() as u64,
        })
    }
}

/// Connection records in a map.
#[derive(Default)]
pub struct InMemoryConnections {
    records: Mutex<HashMap<WorkspaceId, Connection>>,
    fail_record_sync: Mutex<bool>,
}

impl InMemoryConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, workspace: &WorkspaceId) -> Option<Connection> {
        self.records.lock().unwrap().get(workspace).cloned()
    }

    pub fn insert(&self, connection: Connection) {
        self.records
            .lock()
            .unwrap()
            .insert(connection.workspace_id.clone(), connection);
    }

    /// Make `record_sync` fail, as a lost database connection would.
    pub fn fail_record_sync(&self, fail: bool) {
        *self.fail_record_sync.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl ConnectionStore for InMemoryConnections {
    async fn load(&self, workspace: &WorkspaceId) -> Result<Option<Connection>, SyncError> {
        Ok(self.get(workspace))
    }

    async fn save(&self, connection: &Connection) -> Result<(), SyncError> {
        self.insert(connection.clone());
        Ok(())
    }

    async fn delete(&self, workspace: &WorkspaceId) -> Result<bool, SyncError> {
        Ok(self.records.lock().unwrap().remove(workspace).is_some())
    }

    async fn record_sync(
        &self,
        workspace: &WorkspaceId,
        head: &ObjectId,
        tracked_map: &PathMap,
    ) -> Result<(), SyncError> {
        if *self.fail_record_sync.lock().unwrap() {
            return Err(SyncError::Storage("database is locked".into()));
        }
        let mut records = self.records.lock().unwrap();
        let connection = records
            .get_mut(workspace)
            .ok_or_else(|| SyncError::NotConnected(workspace.clone()))?;
        connection.last_commit_sha = Some(head.clone());
        connection.tracked_map = tracked_map.clone();
        connection.updated_at = chrono::Utc::now();
        Ok(())
    }
}

/// Workspace file sets in a map.
#[derive(Default)]
pub struct InMemoryWorkspaces {
    files: Mutex<HashMap<WorkspaceId, WorkspaceFiles>>,
}

impl InMemoryWorkspaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, workspace: &WorkspaceId, files: WorkspaceFiles) {
        self.files.lock().unwrap().insert(workspace.clone(), files);
    }

    pub fn get(&self, workspace: &WorkspaceId) -> WorkspaceFiles {
        self.files
            .lock()
            .unwrap()
            .get(workspace)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WorkspaceStore for InMemoryWorkspaces {
    async fn load_files(&self, workspace: &WorkspaceId) -> Result<WorkspaceFiles, SyncError> {
        Ok(self.get(workspace))
    }

    async fn save_files(
        &self,
        workspace: &WorkspaceId,
        files: &WorkspaceFiles,
    ) -> Result<(), SyncError> {
        self.set(workspace, files.clone());
        Ok(())
    }
}

/// Grants every caller access to every workspace.
pub struct AllowAll;

#[async_trait::async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _: &Caller, _: &WorkspaceId) -> Result<Access, SyncError> {
        Ok(Access::Allow)
    }
}

/// Grants access only to the listed caller/workspace pairs.
#[derive(Default)]
pub struct StaticAuthorizer {
    grants: HashSet<(String, WorkspaceId)>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, caller: &str, workspace: &WorkspaceId) -> Self {
        self.grants.insert((caller.to_owned(), workspace.clone()));
        self
    }
}

#[async_trait::async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
    ) -> Result<Access, SyncError> {
        if self
            .grants
            .contains(&(caller.as_str().to_owned(), workspace.clone()))
        {
            Ok(Access::Allow)
        } else {
            Ok(Access::Deny)
        }
    }
}

/// Records every audited result.
#[derive(Default)]
pub struct RecordingAudit {
    entries: Mutex<Vec<(WorkspaceId, SyncOperation, SyncResult)>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(WorkspaceId, SyncOperation, SyncResult)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuditSink for RecordingAudit {
    async fn record(
        &self,
        workspace: &WorkspaceId,
        operation: SyncOperation,
        result: &SyncResult,
    ) -> Result<(), SyncError> {
        self.entries
            .lock()
            .unwrap()
            .push((workspace.clone(), operation, result.clone()));
        Ok(())
    }
}
