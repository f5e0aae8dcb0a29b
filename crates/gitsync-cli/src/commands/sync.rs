use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use gitsync::{
    Caller, RemoteError, SyncEngine, SyncError, SyncResult, SyncStatus, WorkspaceId,
    WorkspaceStore,
};
use gitsync_store::SqliteStore;

/// Push the stored workspace files.
pub async fn push(
    engine: &SyncEngine,
    store: &SqliteStore,
    caller: &Caller,
    workspace: &WorkspaceId,
    message: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    super::ensure_access(store, caller, workspace).await?;
    let files = store.load_files(workspace).await?;

    let result = with_timeout(timeout, engine.push(caller, workspace, &files, message)).await?;
    println!("{}", describe(&result));
    Ok(())
}

pub async fn pull(
    engine: &SyncEngine,
    caller: &Caller,
    workspace: &WorkspaceId,
    timeout: Duration,
) -> Result<()> {
    let outcome = with_timeout(timeout, engine.pull(caller, workspace)).await?;
    println!("{}", describe(&outcome.result));
    Ok(())
}

/// Bound a sync operation. Expiry is reported like any other unreachable remote.
async fn with_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, SyncError>>,
) -> Result<T, SyncError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::RemoteUnavailable(RemoteError::Network(format!(
            "timed out after {}s",
            limit.as_secs()
        )))),
    }
}

fn describe(result: &SyncResult) -> String {
    match result.status {
        SyncStatus::UpToDate => format!(
            "Already up to date at {} ({} files).",
            result.head.short(),
            result.total_files
        ),
        SyncStatus::Pushed => format!(
            "Pushed {}: {} uploaded, {} deleted.",
            result.head.short(),
            result.files_uploaded,
            result.files_deleted
        ),
        SyncStatus::Pulled => format!(
            "Pulled {}: {} downloaded, {} deleted.",
            result.head.short(),
            result.files_downloaded,
            result.files_deleted
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsync::content_id;

    #[tokio::test]
    async fn expired_operation_is_remote_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, SyncError>(())
        };

        let err = with_timeout(Duration::from_millis(10), slow)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RemoteUnavailable(RemoteError::Network(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn finished_operation_passes_through() {
        let value = with_timeout(Duration::from_secs(5), async { Ok::<_, SyncError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn describe_push() {
        let head = content_id(b"head");
        let result = SyncResult {
            status: SyncStatus::Pushed,
            head: head.clone(),
            files_changed: 3,
            files_uploaded: 2,
            files_deleted: 1,
            files_downloaded: 0,
            total_files: 9,
        };
        assert_eq!(
            describe(&result),
            format!("Pushed {}: 2 uploaded, 1 deleted.", head.short())
        );
    }
}
