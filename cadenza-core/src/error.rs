use crate::model::ContentKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please review it and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Navigation errors
    #[error("Invalid previous view: navigation history is empty")]
    EmptyViewHistory,

    // Catalog errors
    #[error("No {kind} with id {id} in the collection")]
    ContentNotFound { kind: ContentKind, id: u64 },

    #[error("Page {page} is out of range ({total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("Index {index} is outside the displayed page ({len} items)")]
    IndexOutOfPage { index: usize, len: usize },

    // Playback errors
    #[error("Nothing to play for the requested {kind} selection")]
    NothingToPlay { kind: ContentKind },

    // Collaborator errors
    #[error("Local cache error: {reason}")]
    Cache { reason: String },

    #[error("Remote request failed: {reason}")]
    Remote { reason: String },

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
