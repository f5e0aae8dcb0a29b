pub mod connect;
pub mod files;
pub mod history;
pub mod status;
pub mod sync;

use anyhow::{Result, bail};
use gitsync::{Access, Authorizer, Caller, WorkspaceId};
use gitsync_store::SqliteStore;

/// Gate for commands that touch the store without going through the engine.
pub async fn ensure_access(
    store: &SqliteStore,
    caller: &Caller,
    workspace: &WorkspaceId,
) -> Result<()> {
    match store.authorize(caller, workspace).await? {
        Access::Allow => Ok(()),
        Access::Deny => bail!("{caller} may not access workspace {workspace}"),
    }
}
