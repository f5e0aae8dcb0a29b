use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use gitsync::{
    Access, AuditSink, Authorizer, Caller, Connection, ConnectionStore, Credential, FileContent,
    ObjectId, PathMap, SyncError, SyncOperation, SyncResult, WorkspaceFiles, WorkspaceId,
    WorkspaceStore,
};
use rusqlite::OptionalExtension;

use crate::schema;

/// A workspace row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub files: usize,
}

/// One completed push or pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub operation: SyncOperation,
    pub head: ObjectId,
    pub files_changed: usize,
    pub total_files: usize,
    pub recorded_at: DateTime<Utc>,
}

/// SQLite-backed workspaces, connections and sync history.
///
/// Implements every storage seam the engine needs. Access is granted to
/// the caller that owns the workspace.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: rusqlite::Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        schema::migrations()
            .to_latest(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a workspace owned by `owner`. Fails if the id is taken.
    pub fn create_workspace(&self, id: &WorkspaceId, owner: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workspaces (id, owner, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![id.as_str(), owner, Utc::now().to_rfc3339()],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::WorkspaceExists(id.clone())
            }
            other => StoreError::Database(other.to_string()),
        })?;

        tracing::debug!(workspace = %id, owner, "created workspace");
        Ok(())
    }

    pub fn workspace(&self, id: &WorkspaceId) -> Result<Option<WorkspaceRecord>, StoreError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT w.id, w.owner, w.created_at,
                    (SELECT COUNT(*) FROM workspace_files f WHERE f.workspace_id = w.id)
             FROM workspaces w
             WHERE w.id = ?1",
            [id.as_str()],
            row_to_workspace,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    pub fn list_workspaces(&self) -> Result<Vec<WorkspaceRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT w.id, w.owner, w.created_at,
                        (SELECT COUNT(*) FROM workspace_files f WHERE f.workspace_id = w.id)
                 FROM workspaces w
                 ORDER BY w.id",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        stmt.query_map([], row_to_workspace)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Most recent syncs first.
    pub fn history(
        &self,
        workspace: &WorkspaceId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT operation, head, files_changed, total_files, recorded_at
                 FROM sync_history
                 WHERE workspace_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::params![workspace.as_str(), limit as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (operation, head, files_changed, total_files, recorded_at) =
                row.map_err(|e| StoreError::Database(e.to_string()))?;
            entries.push(HistoryEntry {
                operation: SyncOperation::parse(&operation)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown operation {operation:?}")))?,
                head: parse_object_id(&head)?,
                files_changed: files_changed.max(0) as usize,
                total_files: total_files.max(0) as usize,
                recorded_at: parse_timestamp(&recorded_at)?,
            });
        }
        Ok(entries)
    }

    fn load_connection(&self, workspace: &WorkspaceId) -> Result<Option<Connection>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT owner, repo, branch, credential, last_commit_sha, tracked_map, updated_at
                 FROM connections
                 WHERE workspace_id = ?1",
                [workspace.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some((owner, repo, branch, credential, last_commit_sha, tracked_map, updated_at)) = row
        else {
            return Ok(None);
        };

        let tracked_map: PathMap = serde_json::from_str(&tracked_map)
            .map_err(|e| StoreError::Corrupt(format!("tracked map: {e}")))?;

        Ok(Some(Connection {
            workspace_id: workspace.clone(),
            owner,
            repo,
            branch,
            credential: Credential::new(credential),
            last_commit_sha: last_commit_sha.as_deref().map(parse_object_id).transpose()?,
            tracked_map,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    fn save_connection(&self, connection: &Connection) -> Result<(), StoreError> {
        let tracked_map = serde_json::to_string(&connection.tracked_map)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO connections
                (workspace_id, owner, repo, branch, credential, last_commit_sha, tracked_map, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                connection.workspace_id.as_str(),
                connection.owner,
                connection.repo,
                connection.branch,
                connection.credential.expose(),
                connection.last_commit_sha.as_ref().map(ObjectId::as_str),
                tracked_map,
                connection.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete_connection(&self, workspace: &WorkspaceId) -> Result<bool, StoreError> {
        let conn = self.conn();
        let removed = conn
            .execute(
                "DELETE FROM connections WHERE workspace_id = ?1",
                [workspace.as_str()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(removed > 0)
    }

    /// Returns `false` when the workspace has no connection to update.
    fn update_sync_state(
        &self,
        workspace: &WorkspaceId,
        head: &ObjectId,
        tracked_map: &PathMap,
    ) -> Result<bool, StoreError> {
        let tracked_map =
            serde_json::to_string(tracked_map).map_err(|e| StoreError::Database(e.to_string()))?;

        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE connections
                 SET last_commit_sha = ?2, tracked_map = ?3, updated_at = ?4
                 WHERE workspace_id = ?1",
                rusqlite::params![
                    workspace.as_str(),
                    head.as_str(),
                    tracked_map,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(updated > 0)
    }

    fn read_files(&self, workspace: &WorkspaceId) -> Result<WorkspaceFiles, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT path, content FROM workspace_files
                 WHERE workspace_id = ?1
                 ORDER BY path",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        stmt.query_map([workspace.as_str()], |row| {
            let path: String = row.get(0)?;
            let content: String = row.get(1)?;
            Ok((path, FileContent::from_stored(content)))
        })
        .map_err(|e| StoreError::Database(e.to_string()))?
        .collect::<Result<_, _>>()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Replace the workspace's file set in one transaction.
    fn write_files(
        &self,
        workspace: &WorkspaceId,
        files: &WorkspaceFiles,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute(
            "DELETE FROM workspace_files WHERE workspace_id = ?1",
            [workspace.as_str()],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO workspace_files (workspace_id, path, content)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;
            for (path, content) in files.iter() {
                insert
                    .execute(rusqlite::params![
                        workspace.as_str(),
                        path,
                        content.to_stored()
                    ])
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn owner_of(&self, workspace: &WorkspaceId) -> Result<Option<String>, StoreError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT owner FROM workspaces WHERE id = ?1",
            [workspace.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn append_history(
        &self,
        workspace: &WorkspaceId,
        operation: SyncOperation,
        result: &SyncResult,
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_history
                (workspace_id, operation, head, files_changed, total_files, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                workspace.as_str(),
                operation.as_str(),
                result.head.as_str(),
                result.files_changed as i64,
                result.total_files as i64,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

fn row_to_workspace(row: &rusqlite::Row) -> rusqlite::Result<WorkspaceRecord> {
    let id: String = row.get(0)?;
    let owner: String = row.get(1)?;
    let created_at: String = row.get(2)?;
    let files: i64 = row.get(3)?;

    Ok(WorkspaceRecord {
        id: WorkspaceId::new(id),
        owner,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        files: files.max(0) as usize,
    })
}

fn parse_object_id(hex: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse(hex).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {value:?}: {e}")))
}

#[async_trait::async_trait]
impl ConnectionStore for SqliteStore {
    async fn load(&self, workspace: &WorkspaceId) -> Result<Option<Connection>, SyncError> {
        Ok(self.load_connection(workspace)?)
    }

    async fn save(&self, connection: &Connection) -> Result<(), SyncError> {
        Ok(self.save_connection(connection)?)
    }

    async fn delete(&self, workspace: &WorkspaceId) -> Result<bool, SyncError> {
        Ok(self.delete_connection(workspace)?)
    }

    async fn record_sync(
        &self,
        workspace: &WorkspaceId,
        head: &ObjectId,
        tracked_map: &PathMap,
    ) -> Result<(), SyncError> {
        if self.update_sync_state(workspace, head, tracked_map)? {
            Ok(())
        } else {
            Err(SyncError::NotConnected(workspace.clone()))
        }
    }
}

#[async_trait::async_trait]
impl WorkspaceStore for SqliteStore {
    async fn load_files(&self, workspace: &WorkspaceId) -> Result<WorkspaceFiles, SyncError> {
        Ok(self.read_files(workspace)?)
    }

    async fn save_files(
        &self,
        workspace: &WorkspaceId,
        files: &WorkspaceFiles,
    ) -> Result<(), SyncError> {
        Ok(self.write_files(workspace, files)?)
    }
}

#[async_trait::async_trait]
impl Authorizer for SqliteStore {
    async fn authorize(
        &self,
        caller: &Caller,
        workspace: &WorkspaceId,
    ) -> Result<Access, SyncError> {
        match self.owner_of(workspace)? {
            Some(owner) if owner == caller.as_str() => Ok(Access::Allow),
            _ => Ok(Access::Deny),
        }
    }
}

#[async_trait::async_trait]
impl AuditSink for SqliteStore {
    async fn record(
        &self,
        workspace: &WorkspaceId,
        operation: SyncOperation,
        result: &SyncResult,
    ) -> Result<(), SyncError> {
        Ok(self.append_history(workspace, operation, result)?)
    }
}

/// Errors specific to store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("workspace {0} already exists")]
    WorkspaceExists(WorkspaceId),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Storage(e.to_string())
    }
}
