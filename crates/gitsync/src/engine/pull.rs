use super::SyncEngine;
use crate::audit::SyncOperation;
use crate::batch::run_batched;
use crate::connection::{Caller, WorkspaceId};
use crate::error::SyncError;
use crate::files::FileContent;
use crate::report::{PullOutcome, SyncResult, SyncStatus};

impl SyncEngine {
    /// Bring remote changes into the workspace.
    ///
    /// Only paths whose remote id differs from the tracked map are
    /// downloaded. Paths the remote dropped since the last sync are removed;
    /// local-only paths are kept.
    pub async fn pull(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
    ) -> Result<PullOutcome, SyncError> {
        self.authorize(caller, workspace).await?;
        let _guard = self.lock(workspace).await;

        let connection = self.require_connection(workspace).await?;
        let target = connection.target();

        let head = self.require_head(&target, &connection.branch).await?;
        let remote_tree = self.fetch_tree(&target, &head).await?;
        let remote_ids = remote_tree.ids();

        let to_fetch: Vec<_> = remote_tree
            .entries
            .iter()
            .filter(|(path, entry)| connection.tracked_map.get(path) != Some(&entry.id))
            .collect();

        // A truncated listing says nothing about the paths it left out, so
        // they keep their tracked ids and are never treated as deleted.
        let unlisted = connection.tracked_map.missing_from(&remote_ids);
        let mut tracked = remote_ids;
        let deleted: Vec<String> = if remote_tree.truncated {
            for path in unlisted {
                if let Some(id) = connection.tracked_map.get(path) {
                    tracked.insert(path, id.clone());
                }
            }
            Vec::new()
        } else {
            unlisted.into_iter().map(str::to_owned).collect()
        };

        tracing::debug!(
            workspace = %workspace,
            fetch = to_fetch.len(),
            deleted = deleted.len(),
            "computed pull diff"
        );

        let fetched = run_batched(to_fetch, self.batch_size, |(path, entry)| {
            let target = &target;
            async move {
                let bytes = self.remote.blob(target, entry).await.map_err(|source| {
                    SyncError::PartialBatchFailure {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok::<_, SyncError>((path.clone(), FileContent::from_bytes(bytes)))
            }
        })
        .await?;

        let mut files = self.workspaces.load_files(workspace).await?;
        let changed = !fetched.is_empty() || deleted.iter().any(|p| files.contains(p));
        let downloaded = fetched.len();

        for (path, content) in fetched {
            files.insert(path, content);
        }
        for path in &deleted {
            files.remove(path);
        }

        if changed {
            self.workspaces.save_files(workspace, &files).await?;
        }

        self.record_sync(workspace, &head, &tracked).await;

        let status = if downloaded == 0 && deleted.is_empty() {
            SyncStatus::UpToDate
        } else {
            SyncStatus::Pulled
        };
        let result = SyncResult {
            status,
            head,
            files_changed: downloaded + deleted.len(),
            files_uploaded: 0,
            files_downloaded: downloaded,
            files_deleted: deleted.len(),
            total_files: tracked.len(),
        };

        tracing::info!(
            workspace = %workspace,
            repo = %target.full_name(),
            head = %result.head,
            downloaded,
            deleted = result.files_deleted,
            "pulled"
        );
        self.audit(workspace, SyncOperation::Pull, &result).await;

        Ok(PullOutcome { files, result })
    }
}
