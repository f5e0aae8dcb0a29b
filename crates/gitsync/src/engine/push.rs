use std::collections::BTreeSet;

use chrono::Utc;

use super::{SyncEngine, ref_update_error};
use crate::audit::SyncOperation;
use crate::batch::run_batched;
use crate::connection::{Caller, WorkspaceId};
use crate::error::SyncError;
use crate::files::{FileContent, WorkspaceFiles, validate_path};
use crate::object_id::{ObjectId, content_id};
use crate::path_map::PathMap;
use crate::remote::{MODE_FILE, RemoteTree, TreeChange};
use crate::report::{SyncResult, SyncStatus};

const MODE_EXECUTABLE: &str = "100755";

/// A text file whose content differs from the remote.
#[derive(Debug)]
struct PendingUpload<'a> {
    path: &'a str,
    content: &'a str,
    mode: &'static str,
    expected: ObjectId,
}

/// The difference between a local file set and a remote tree.
#[derive(Debug)]
struct PushPlan<'a> {
    uploads: Vec<PendingUpload<'a>>,
    deletions: Vec<String>,
    /// Tracked map to store once the push lands.
    tracked: PathMap,
    /// Text files considered by the diff.
    text_files: usize,
}

impl<'a> PushPlan<'a> {
    fn compute(files: &'a WorkspaceFiles, remote: &RemoteTree) -> Self {
        let mut local_ids = PathMap::new();
        let mut uploads = Vec::new();
        let mut binary = BTreeSet::new();

        for (path, content) in files.iter() {
            let FileContent::Text(text) = content else {
                binary.insert(path);
                continue;
            };

            let id = content_id(text.as_bytes());
            let remote_entry = remote.get(path);

            if remote_entry.map(|e| &e.id) != Some(&id) {
                let mode = match remote_entry {
                    Some(e) if e.mode == MODE_EXECUTABLE => MODE_EXECUTABLE,
                    _ => MODE_FILE,
                };
                uploads.push(PendingUpload {
                    path,
                    content: text,
                    mode,
                    expected: id.clone(),
                });
            }
            local_ids.insert(path, id);
        }

        // Binary files are never pushed, so they must never be deleted either.
        let deletions = remote
            .entries
            .keys()
            .filter(|path| !local_ids.contains(path) && !binary.contains(path.as_str()))
            .cloned()
            .collect();

        let text_files = local_ids.len();
        let mut tracked = local_ids;
        for path in binary {
            if let Some(entry) = remote.get(path) {
                tracked.insert(path, entry.id.clone());
            }
        }

        Self {
            uploads,
            deletions,
            tracked,
            text_files,
        }
    }

    fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.deletions.is_empty()
    }
}

impl SyncEngine {
    /// Make the remote branch match the text files in `files`.
    ///
    /// Only changed content is uploaded; the new tree names just the changed
    /// and deleted paths and inherits everything else from the current head.
    /// The ref moves without force, so a branch that moved since it was read
    /// yields [`SyncError::ConcurrentUpdate`] and nothing is stored locally.
    pub async fn push(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
        files: &WorkspaceFiles,
        message: Option<&str>,
    ) -> Result<SyncResult, SyncError> {
        self.authorize(caller, workspace).await?;
        let _guard = self.lock(workspace).await;

        for path in files.paths() {
            validate_path(path).map_err(SyncError::InvalidPath)?;
        }

        let connection = self.require_connection(workspace).await?;
        let target = connection.target();
        let branch = connection.branch.as_str();

        let base = self.find_head(&target, branch).await?;
        let remote_tree = match &base {
            Some(commit) => self.fetch_tree(&target, commit).await?,
            None => RemoteTree::default(),
        };

        let mut plan = PushPlan::compute(files, &remote_tree);
        tracing::debug!(
            workspace = %workspace,
            uploads = plan.uploads.len(),
            deletions = plan.deletions.len(),
            "computed push diff"
        );

        if plan.is_empty() {
            return match base {
                Some(head) => Ok(SyncResult::up_to_date(head, plan.text_files)),
                // Nothing to put in a first commit.
                None => Err(SyncError::BranchNotFound(branch.to_owned())),
            };
        }

        let uploads = std::mem::take(&mut plan.uploads);
        let uploaded = run_batched(uploads, self.batch_size, |upload| {
            let target = &target;
            async move {
                let id = self
                    .remote
                    .create_blob(target, upload.content.as_bytes())
                    .await
                    .map_err(|source| SyncError::PartialBatchFailure {
                        path: upload.path.to_owned(),
                        source,
                    })?;
                Ok::<_, SyncError>((upload, id))
            }
        })
        .await?;

        let mut changes = Vec::with_capacity(uploaded.len() + plan.deletions.len());
        for (upload, id) in &uploaded {
            if *id != upload.expected {
                tracing::warn!(
                    path = upload.path,
                    local = %upload.expected,
                    remote = %id,
                    "remote assigned a different blob id than computed locally"
                );
                plan.tracked.insert(upload.path, id.clone());
            }
            changes.push(TreeChange {
                path: upload.path.to_owned(),
                mode: upload.mode.to_owned(),
                id: Some(id.clone()),
            });
        }
        for path in &plan.deletions {
            changes.push(TreeChange {
                path: path.clone(),
                mode: MODE_FILE.to_owned(),
                id: None,
            });
        }

        let tree = self
            .remote
            .create_tree(&target, remote_tree.id.as_ref(), &changes)
            .await
            .map_err(SyncError::RemoteUnavailable)?;

        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| default_message(workspace));
        let parents: Vec<ObjectId> = base.iter().cloned().collect();

        let commit = self
            .remote
            .create_commit(&target, &message, &tree, &parents)
            .await
            .map_err(SyncError::RemoteUnavailable)?;

        let moved = match &base {
            Some(_) => self.remote.update_branch(&target, branch, &commit).await,
            None => self.remote.create_branch(&target, branch, &commit).await,
        };
        moved.map_err(|e| ref_update_error(branch, e))?;

        self.record_sync(workspace, &commit, &plan.tracked).await;

        let result = SyncResult {
            status: SyncStatus::Pushed,
            head: commit,
            files_changed: uploaded.len() + plan.deletions.len(),
            files_uploaded: uploaded.len(),
            files_downloaded: 0,
            files_deleted: plan.deletions.len(),
            total_files: plan.text_files,
        };

        tracing::info!(
            workspace = %workspace,
            repo = %target.full_name(),
            branch,
            head = %result.head,
            uploaded = result.files_uploaded,
            deleted = result.files_deleted,
            "pushed"
        );
        self.audit(workspace, SyncOperation::Push, &result).await;

        Ok(result)
    }
}

fn default_message(workspace: &WorkspaceId) -> String {
    format!("Sync workspace {workspace} at {}", Utc::now().to_rfc2822())
}
