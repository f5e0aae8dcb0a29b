use anyhow::Result;
use gitsync::{Caller, WorkspaceId};
use gitsync_store::SqliteStore;

pub async fn run(
    store: &SqliteStore,
    caller: &Caller,
    workspace: &WorkspaceId,
    limit: usize,
) -> Result<()> {
    super::ensure_access(store, caller, workspace).await?;

    let entries = store.history(workspace, limit)?;
    if entries.is_empty() {
        println!("No syncs recorded for {workspace}.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<4}  {}  {} changed, {} total",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            entry.operation.as_str(),
            entry.head.short(),
            entry.files_changed,
            entry.total_files
        );
    }

    Ok(())
}
