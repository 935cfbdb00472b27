use crate::error::{Result, StorageError};
use async_trait::async_trait;
use cadenza_core::{Content, ContentKind, LocalCache};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const SCHEMA_SQL: &str = r"
-- One row per catalog item; payload holds the item as JSON
CREATE TABLE IF NOT EXISTS content (
    kind TEXT NOT NULL,
    id INTEGER NOT NULL,
    sort_key INTEGER NOT NULL,
    payload TEXT NOT NULL,
    cached_at INTEGER NOT NULL,
    UNIQUE(kind, id)
);

CREATE INDEX IF NOT EXISTS idx_content_kind_sort ON content(kind, sort_key DESC, id DESC);
";

/// SQLite-based catalog cache shared by every content kind
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open the cache at the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the cache database cannot be created or opened.
    pub async fn new() -> Result<Self> {
        let cache_path = cadenza_core::catalog_cache_db_path();
        Self::open(&cache_path).await
    }

    /// Open a cache at a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path) -> Result<Self> {
        info!("Opening catalog cache database at {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory cache
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            Ok(())
        })
        .await?;

        info!("Catalog cache database initialized");
        Ok(Self { conn })
    }

    /// Every cached item of `T`'s kind, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row does not decode.
    pub async fn load<T: Content>(&self) -> Result<Vec<T>> {
        let kind = T::KIND.as_str();

        let payloads = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT payload FROM content
                    WHERE kind = ?1
                    ORDER BY sort_key DESC, id DESC
                ",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![kind], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        debug!("Loaded {} cached {}", payloads.len(), T::KIND);
        payloads
            .iter()
            .map(|payload| {
                serde_json::from_str(payload).map_err(|source| StorageError::PayloadError {
                    kind: T::KIND,
                    source,
                })
            })
            .collect()
    }

    /// Largest sort key cached for `kind`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest_sort_key(&self, kind: ContentKind) -> Result<Option<i64>> {
        let kind = kind.as_str();

        self.conn
            .call(move |conn| {
                let key = conn.query_row(
                    "SELECT MAX(sort_key) FROM content WHERE kind = ?1",
                    rusqlite::params![kind],
                    |row| row.get::<_, Option<i64>>(0),
                )?;
                Ok(key)
            })
            .await
            .map_err(Into::into)
    }

    /// When `kind` was last written to
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn last_cached_at(&self, kind: ContentKind) -> Result<Option<DateTime<Utc>>> {
        let kind = kind.as_str();

        let timestamp = self
            .conn
            .call(move |conn| {
                let timestamp = conn.query_row(
                    "SELECT MAX(cached_at) FROM content WHERE kind = ?1",
                    rusqlite::params![kind],
                    |row| row.get::<_, Option<i64>>(0),
                )?;
                Ok(timestamp)
            })
            .await?;

        Ok(timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }

    /// Insert or update `items`, keyed by kind and id
    ///
    /// # Errors
    ///
    /// Returns an error if an item cannot be encoded or the write fails; nothing is
    /// written in that case.
    pub async fn store<T: Content>(&self, items: &[T]) -> Result<usize> {
        let rows = items
            .iter()
            .map(|item| -> Result<(i64, i64, String)> {
                let id = i64::try_from(item.id())
                    .map_err(|_| StorageError::IdOutOfRange { id: item.id() })?;
                let payload = serde_json::to_string(item).map_err(|source| {
                    StorageError::PayloadError {
                        kind: T::KIND,
                        source,
                    }
                })?;
                Ok((id, item.sort_key(), payload))
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Caching {} {}", rows.len(), T::KIND);
        let kind = T::KIND.as_str();
        let now = Utc::now().timestamp();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(
                        r"
                        INSERT INTO content (kind, id, sort_key, payload, cached_at)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        ON CONFLICT(kind, id) DO UPDATE SET
                            sort_key = excluded.sort_key,
                            payload = excluded.payload,
                            cached_at = excluded.cached_at
                    ",
                    )?;
                    for (id, sort_key, payload) in &rows {
                        stmt.execute(rusqlite::params![kind, id, sort_key, payload, now])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Into::into)
    }

    /// Checkpoint WAL for clean shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl<T: Content> LocalCache<T> for SqliteCache {
    async fn get_all(&self) -> cadenza_core::Result<Vec<T>> {
        Ok(self.load::<T>().await?)
    }

    async fn latest_key(&self) -> cadenza_core::Result<Option<i64>> {
        Ok(self.latest_sort_key(T::KIND).await?)
    }

    async fn persist(&self, delta: &[T]) -> cadenza_core::Result<()> {
        self.store(delta).await?;
        Ok(())
    }
}
