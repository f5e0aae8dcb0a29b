use std::path::Path;

use anyhow::{Context, Result};
use gitsync::{Caller, FileContent, WorkspaceFiles, WorkspaceId, WorkspaceStore, validate_path};
use gitsync_store::SqliteStore;

use super::ensure_access;

pub fn init(store: &SqliteStore, workspace: &WorkspaceId, caller: &Caller) -> Result<()> {
    store.create_workspace(workspace, caller.as_str())?;
    println!("Created workspace {workspace} (owner {caller})");
    Ok(())
}

pub async fn import(
    store: &SqliteStore,
    caller: &Caller,
    workspace: &WorkspaceId,
    dir: &Path,
) -> Result<()> {
    ensure_access(store, caller, workspace).await?;

    let files = read_dir_files(dir)?;
    store.save_files(workspace, &files).await?;

    println!("Imported {} files into {workspace}.", files.len());
    Ok(())
}

pub async fn export(
    store: &SqliteStore,
    caller: &Caller,
    workspace: &WorkspaceId,
    dir: &Path,
) -> Result<()> {
    ensure_access(store, caller, workspace).await?;

    let files = store.load_files(workspace).await?;
    let written = write_dir_files(dir, &files)?;

    println!("Exported {written} files to {}.", dir.display());
    Ok(())
}

/// Read every file under `dir`, keyed by its `/`-separated relative path.
/// `.git` directories are skipped.
pub fn read_dir_files(dir: &Path) -> Result<WorkspaceFiles> {
    let mut files = WorkspaceFiles::new();
    collect(dir, dir, &mut files)?;
    Ok(files)
}

fn collect(root: &Path, dir: &Path, files: &mut WorkspaceFiles) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            collect(root, &path, files)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let bytes =
                std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            files.insert(key, FileContent::from_bytes(bytes));
        }
    }

    Ok(())
}

/// Write `files` below `dir`, creating parent directories as needed.
pub fn write_dir_files(dir: &Path, files: &WorkspaceFiles) -> Result<usize> {
    let mut written = 0;

    for (path, content) in files.iter() {
        validate_path(path).map_err(|p| anyhow::anyhow!("refusing to write {p}"))?;

        let target = dir.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let bytes = content
            .to_bytes()
            .with_context(|| format!("corrupt binary content at {path}"))?;
        std::fs::write(&target, bytes)
            .with_context(|| format!("failed to write {}", target.display()))?;
        written += 1;
    }

    Ok(written)
}
