use std::fmt;

use crate::connection::WorkspaceId;
use crate::report::SyncResult;

/// Which operation produced a [`SyncResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Push,
    Pull,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "push" => Some(Self::Push),
            "pull" => Some(Self::Pull),
            _ => None,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives completed sync outcomes. Failures here are logged, never raised.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        workspace: &WorkspaceId,
        operation: SyncOperation,
        result: &SyncResult,
    ) -> Result<(), crate::SyncError>;
}
