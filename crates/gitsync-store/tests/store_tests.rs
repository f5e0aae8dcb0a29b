use gitsync::{
    Access, AuditSink, Authorizer, Caller, Connection, ConnectionStore, Credential, FileContent,
    PathMap, SyncError, SyncOperation, SyncResult, SyncStatus, WorkspaceFiles,
    WorkspaceId, WorkspaceStore, content_id,
};
use gitsync_store::{SqliteStore, StoreError};

fn create_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store.create_workspace(&ws(), "alice").unwrap();
    store
}

fn ws() -> WorkspaceId {
    WorkspaceId::new("notes")
}

fn sample_connection() -> Connection {
    Connection::new(ws(), "octo", "notes", "main", Credential::new("ghp_secret"))
}

#[test]
fn duplicate_workspace_is_rejected() {
    let store = create_store();
    let err = store.create_workspace(&ws(), "bob").unwrap_err();
    assert!(matches!(err, StoreError::WorkspaceExists(_)));
}

#[test]
fn list_workspaces_counts_files() {
    let store = create_store();
    store
        .create_workspace(&WorkspaceId::new("empty"), "bob")
        .unwrap();

    let list = store.list_workspaces().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id.as_str(), "empty");
    assert_eq!(list[1].owner, "alice");
    assert_eq!(list[1].files, 0);
}

#[tokio::test]
async fn connection_round_trips() {
    let store = create_store();
    let mut connection = sample_connection();
    connection.last_commit_sha = Some(content_id(b"commit"));
    connection
        .tracked_map
        .insert("a.md", content_id(b"a"));
    store.save(&connection).await.unwrap();

    let loaded = store.load(&ws()).await.unwrap().unwrap();
    assert_eq!(loaded.owner, "octo");
    assert_eq!(loaded.branch, "main");
    assert_eq!(loaded.credential.expose(), "ghp_secret");
    assert_eq!(loaded.last_commit_sha, connection.last_commit_sha);
    assert_eq!(loaded.tracked_map, connection.tracked_map);
}

#[tokio::test]
async fn save_replaces_existing_connection() {
    let store = create_store();
    let mut first = sample_connection();
    first.last_commit_sha = Some(content_id(b"old"));
    store.save(&first).await.unwrap();

    let second = Connection::new(ws(), "octo", "journal", "drafts", Credential::new("ghp_2"));
    store.save(&second).await.unwrap();

    let loaded = store.load(&ws()).await.unwrap().unwrap();
    assert_eq!(loaded.repo, "journal");
    assert!(loaded.last_commit_sha.is_none());
    assert!(loaded.tracked_map.is_empty());
}

#[tokio::test]
async fn delete_reports_whether_a_row_existed() {
    let store = create_store();
    store.save(&sample_connection()).await.unwrap();

    assert!(store.delete(&ws()).await.unwrap());
    assert!(!store.delete(&ws()).await.unwrap());
    assert!(store.load(&ws()).await.unwrap().is_none());
}

#[tokio::test]
async fn record_sync_updates_cursor() {
    let store = create_store();
    store.save(&sample_connection()).await.unwrap();

    let head = content_id(b"head");
    let tracked: PathMap = [("a.md".to_owned(), content_id(b"a"))].into_iter().collect();
    store.record_sync(&ws(), &head, &tracked).await.unwrap();

    let loaded = store.load(&ws()).await.unwrap().unwrap();
    assert_eq!(loaded.last_commit_sha, Some(head));
    assert_eq!(loaded.tracked_map, tracked);
}

#[tokio::test]
async fn record_sync_without_connection_fails() {
    let store = create_store();
    let err = store
        .record_sync(&ws(), &content_id(b"head"), &PathMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotConnected(_)));
}

#[tokio::test]
async fn files_keep_binary_content() {
    let store = create_store();
    let mut files = WorkspaceFiles::new();
    files.insert_text("notes/a.md", "# A\n");
    files.insert("logo.png", FileContent::from_bytes(vec![0x89, 0x50, 0x4e, 0x47, 0xff]));
    store.save_files(&ws(), &files).await.unwrap();

    let loaded = store.load_files(&ws()).await.unwrap();
    assert_eq!(loaded, files);
    assert!(loaded.get("logo.png").unwrap().is_binary());
}

#[tokio::test]
async fn save_files_replaces_the_whole_set() {
    let store = create_store();
    let mut files = WorkspaceFiles::new();
    files.insert_text("a.md", "a");
    files.insert_text("b.md", "b");
    store.save_files(&ws(), &files).await.unwrap();

    files.remove("a.md");
    store.save_files(&ws(), &files).await.unwrap();

    let loaded = store.load_files(&ws()).await.unwrap();
    assert_eq!(loaded.paths().collect::<Vec<_>>(), vec!["b.md"]);
    assert_eq!(store.workspace(&ws()).unwrap().unwrap().files, 1);
}

#[tokio::test]
async fn only_the_owner_is_authorized() {
    let store = create_store();

    assert_eq!(
        store.authorize(&Caller::new("alice"), &ws()).await.unwrap(),
        Access::Allow
    );
    assert_eq!(
        store.authorize(&Caller::new("mallory"), &ws()).await.unwrap(),
        Access::Deny
    );
    assert_eq!(
        store
            .authorize(&Caller::new("alice"), &WorkspaceId::new("unknown"))
            .await
            .unwrap(),
        Access::Deny
    );
}

#[tokio::test]
async fn history_is_newest_first() {
    let store = create_store();
    let first = SyncResult {
        status: SyncStatus::Pushed,
        head: content_id(b"one"),
        files_changed: 3,
        files_uploaded: 3,
        files_downloaded: 0,
        files_deleted: 0,
        total_files: 3,
    };
    let second = SyncResult::up_to_date(content_id(b"two"), 3);

    store.record(&ws(), SyncOperation::Push, &first).await.unwrap();
    store.record(&ws(), SyncOperation::Pull, &second).await.unwrap();

    let history = store.history(&ws(), 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].operation, SyncOperation::Pull);
    assert_eq!(history[0].head, content_id(b"two"));
    assert_eq!(history[1].files_changed, 3);

    assert_eq!(store.history(&ws(), 1).unwrap().len(), 1);
}

#[test]
fn store_persists_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gitsync.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.create_workspace(&ws(), "alice").unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    let record = reopened.workspace(&ws()).unwrap().unwrap();
    assert_eq!(record.owner, "alice");
}

#[test]
fn store_errors_become_storage_errors() {
    let err: SyncError = StoreError::Database("disk I/O error".into()).into();
    assert!(matches!(err, SyncError::Storage(ref msg) if msg.contains("disk I/O error")));
}

