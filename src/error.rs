use thiserror::Error;

use crate::types::{MutationKind, RecordId};

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    #[error("Invalid filter at \"{path}\": {reason}")]
    InvalidFilter { path: String, reason: String },
}

// ---------------------------------------------------------------------------
// SourceError: failures reported by the remote data source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Remote source unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Query rejected: {0}")]
    QueryRejected(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: RecordId },
}

// ---------------------------------------------------------------------------
// SyncError: outcome of synchronizer operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Fetch failed for \"{table}\"")]
    FetchFailed {
        table: String,
        #[source]
        source: SourceError,
    },

    #[error("{op} failed for \"{table}\"")]
    MutationFailed {
        table: String,
        op: MutationKind,
        #[source]
        source: SourceError,
    },

    #[error("Live updates unavailable for \"{table}\"")]
    LiveUpdatesUnavailable {
        table: String,
        #[source]
        source: SourceError,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Load for \"{table}\" superseded by a newer load")]
    Superseded { table: String },

    #[error("Live collection disposed")]
    Disposed,
}

impl SyncError {
    /// True when the underlying remote failure was a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MutationFailed {
                source: SourceError::NotFound { .. },
                ..
            }
        )
    }
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeatherError {
    #[error("Weather unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store error: {0}")]
    Store(#[from] std::io::Error),

    #[error("Session store corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Validation failures of household actions, raised before anything is
/// written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("Unknown order status \"{0}\"")]
    UnknownStatus(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Record {0} is not in the collection")]
    UnknownRecord(RecordId),
}

// ---------------------------------------------------------------------------
// HouseholdError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HouseholdError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// The default error type is `HouseholdError`.
pub type Result<T, E = HouseholdError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
