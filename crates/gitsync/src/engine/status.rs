use super::SyncEngine;
use crate::connection::{Caller, WorkspaceId};
use crate::error::SyncError;
use crate::report::StatusReport;

impl SyncEngine {
    /// Compare the tracked head with the remote head without changing anything.
    ///
    /// Remote failures do not fail the call: the report keeps the stored
    /// connection details and carries the failure in `error`.
    pub async fn status(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
    ) -> Result<StatusReport, SyncError> {
        self.authorize(caller, workspace).await?;

        let Some(connection) = self.connections.load(workspace).await? else {
            return Ok(StatusReport::disconnected());
        };
        let target = connection.target();

        let mut report = StatusReport {
            connected: true,
            owner: Some(connection.owner.clone()),
            repo: Some(connection.repo.clone()),
            branch: Some(connection.branch.clone()),
            head_tracked: connection.last_commit_sha.clone(),
            repo_url: Some(format!("https://github.com/{}", target.full_name())),
            updated_at: Some(connection.updated_at),
            ..StatusReport::default()
        };

        let head = match self.remote.branch_head(&target, &connection.branch).await {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!(workspace = %workspace, error = %e, "status probe failed");
                report.error = Some(format!("remote unreachable: {e}"));
                return Ok(report);
            }
        };

        match &connection.last_commit_sha {
            Some(tracked) if *tracked == head => {
                report.up_to_date = Some(true);
                report.behind_by = Some(0);
            }
            Some(tracked) => {
                report.up_to_date = Some(false);
                match self.remote.compare(&target, tracked, &head).await {
                    Ok(comparison) => report.behind_by = Some(comparison.ahead_by),
                    Err(e) => {
                        tracing::debug!(workspace = %workspace, error = %e, "compare failed")
                    }
                }
            }
            None => report.up_to_date = Some(false),
        }
        report.head_remote = Some(head);

        match self.remote.repository(&target).await {
            Ok(info) => report.private = Some(info.private),
            Err(e) => tracing::debug!(workspace = %workspace, error = %e, "repository lookup failed"),
        }

        Ok(report)
    }
}
