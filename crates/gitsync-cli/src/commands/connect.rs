use anyhow::{Context, Result, bail};
use gitsync::{Caller, ConnectRequest, Credential, SyncEngine, WorkspaceId};

pub async fn run(
    engine: &SyncEngine,
    caller: &Caller,
    workspace: &WorkspaceId,
    repo: &str,
    branch: Option<String>,
    token: String,
) -> Result<()> {
    let (owner, name) = split_repo(repo)?;

    let info = engine
        .connect(
            caller,
            workspace,
            ConnectRequest {
                owner: owner.to_owned(),
                repo: name.to_owned(),
                branch,
                credential: Credential::new(token),
            },
        )
        .await
        .with_context(|| format!("failed to connect {workspace} to {repo}"))?;

    println!(
        "Connected {workspace} to {}/{} on branch {}.",
        info.owner, info.repo, info.branch
    );
    if info.branch != info.default_branch {
        println!("(default branch is {})", info.default_branch);
    }
    if info.private {
        println!("Repository is private.");
    }

    Ok(())
}

pub async fn disconnect(engine: &SyncEngine, caller: &Caller, workspace: &WorkspaceId) -> Result<()> {
    if engine.disconnect(caller, workspace).await? {
        println!("Disconnected {workspace}. Workspace files were kept.");
    } else {
        println!("{workspace} was not connected.");
    }
    Ok(())
}

pub async fn show(engine: &SyncEngine, caller: &Caller, workspace: &WorkspaceId) -> Result<()> {
    let Some(summary) = engine.connection(caller, workspace).await? else {
        println!("{workspace} is not connected.");
        return Ok(());
    };

    println!("Workspace:   {}", summary.workspace_id);
    println!("Repository:  {}/{}", summary.owner, summary.repo);
    println!("Branch:      {}", summary.branch);
    match &summary.last_commit_sha {
        Some(sha) => println!("Last commit: {sha}"),
        None => println!("Last commit: (never synced)"),
    }
    println!("Tracked:     {} files", summary.tracked_files);
    println!("Updated:     {}", summary.updated_at.to_rfc3339());

    Ok(())
}

fn split_repo(repo: &str) -> Result<(&str, &str)> {
    let repo = repo.trim().trim_end_matches(".git");
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => bail!("expected owner/repo, got {repo:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_owner_and_repo() {
        assert_eq!(split_repo("octo/notes").unwrap(), ("octo", "notes"));
        assert_eq!(split_repo(" octo/notes.git ").unwrap(), ("octo", "notes"));
    }

    #[test]
    fn reject_malformed_repo() {
        assert!(split_repo("notes").is_err());
        assert!(split_repo("/notes").is_err());
        assert!(split_repo("octo/").is_err());
        assert!(split_repo("a/b/c").is_err());
    }
}
