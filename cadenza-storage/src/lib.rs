//! SQLite-backed local cache for catalog content.

pub mod cache;
pub mod error;

pub use cache::SqliteCache;
pub use error::StorageError;
