//! Orchestrator-level errors

use crate::ado::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No connection configured for scope '{0}'")]
    ConnectionNotFound(String),

    /// The remote system could not be reached or refused the plan listing
    #[error("Remote system unavailable: {0}")]
    Remote(#[from] RemoteError),

    #[error("Could not create remote client: {0}")]
    ClientSetup(String),

    /// Refresh produced zero suites; the cached snapshots were left untouched
    #[error("Refresh of scope '{0}' produced no suites; cached data kept")]
    EmptyRefresh(String),

    #[error("Suite '{key}' not found in scope '{scope}'")]
    SnapshotNotFound { scope: String, key: String },

    #[error("Test case {id} not found in suite '{key}'")]
    TestCaseNotFound { key: String, id: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("Integration failed: {0}")]
    Integration(anyhow::Error),

    #[error("Store error: {0}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Store(err)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
