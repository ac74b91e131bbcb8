use crate::paths::LocationKind;
use crate::store::files::FileError;
use crate::store::kv::KvError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure categories reported to the UI layer.
///
/// Every [`StoryError`] maps onto exactly one kind, which is what a client uses to pick
/// the notification it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// A filesystem operation failed after exhausting its retries.
    IoFailure,
    /// A file was read but is not valid JSON.
    CorruptFile,
    /// Valid JSON that is missing required top-level keys.
    InvalidFormat,
    /// The document's major version differs from the application's.
    VersionIncompatible,
    /// The named database exists in no tier and has no backing file.
    NotFound,
    /// The key-value backend refused a write.
    QuotaExceeded,
    /// The caller asked for something that cannot be done (duplicate tag, bad record).
    InvalidInput,
}

#[derive(Error, Debug)]
pub enum StoryError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("Corrupt database file {}: {source}", .path.display())]
    CorruptFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid database document: {0}")]
    InvalidFormat(String),

    #[error("Version {found} is not compatible with this application (expected {expected}.x)")]
    VersionIncompatible { found: String, expected: u64 },

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Record not found in {collection}: {id}")]
    RecordNotFound { collection: String, id: String },

    #[error("No {0} directory is configured")]
    LocationUnset(LocationKind),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Api(String),
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoryError::File(_) | StoryError::LocationUnset(_) => ErrorKind::IoFailure,
            StoryError::Kv(KvError::QuotaExceeded { .. }) => ErrorKind::QuotaExceeded,
            StoryError::Kv(_) => ErrorKind::IoFailure,
            StoryError::CorruptFile { .. } | StoryError::Serialization(_) => ErrorKind::CorruptFile,
            StoryError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            StoryError::VersionIncompatible { .. } => ErrorKind::VersionIncompatible,
            StoryError::DatabaseNotFound(_) | StoryError::RecordNotFound { .. } => {
                ErrorKind::NotFound
            }
            StoryError::Config(_) | StoryError::Api(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;
