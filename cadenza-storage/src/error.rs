use cadenza_core::{ContentKind, CoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    // Database errors
    #[error("Cache database error: {0}")]
    CacheError(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    // Row errors
    #[error("Failed to (de)serialize cached {kind}: {source}")]
    PayloadError {
        kind: ContentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Id {id} does not fit the cache key")]
    IdOutOfRange { id: u64 },

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        Self::Cache {
            reason: err.to_string(),
        }
    }
}
