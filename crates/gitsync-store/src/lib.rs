mod schema;
mod store;

pub use store::{HistoryEntry, SqliteStore, StoreError, WorkspaceRecord};
