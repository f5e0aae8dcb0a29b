use rusqlite_migration::{M, Migrations};

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "CREATE TABLE workspaces (
                id              TEXT PRIMARY KEY,
                owner           TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE workspace_files (
                workspace_id    TEXT NOT NULL,
                path            TEXT NOT NULL,
                content         TEXT NOT NULL,
                PRIMARY KEY (workspace_id, path),
                FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
            );",
        ),
        M::up(
            "CREATE TABLE connections (
                workspace_id    TEXT PRIMARY KEY,
                owner           TEXT NOT NULL,
                repo            TEXT NOT NULL,
                branch          TEXT NOT NULL,
                credential      TEXT NOT NULL,
                last_commit_sha TEXT,
                tracked_map     TEXT NOT NULL DEFAULT '{}',
                updated_at      TEXT NOT NULL,
                FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
            );

            CREATE TABLE sync_history (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id    TEXT NOT NULL,
                operation       TEXT NOT NULL,
                head            TEXT NOT NULL,
                files_changed   INTEGER NOT NULL,
                total_files     INTEGER NOT NULL,
                recorded_at     TEXT NOT NULL,
                FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_sync_history_workspace ON sync_history(workspace_id, id);",
        ),
    ])
}
