//! SQLite fingerprint registry
//!
//! Durable set of content hashes that are known to be embedded and
//! indexed, plus the document-store cursor of the last complete run.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::ContentHash;

/// SQLite-based fingerprint registry
pub struct FingerprintRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl FingerprintRegistry {
    /// Create or open the registry at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::registry(format!("Failed to open database: {}", e)))?;

        let registry = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        registry.migrate()?;
        Ok(registry)
    }

    /// Create an in-memory registry (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::registry(format!("Failed to open in-memory database: {}", e)))?;

        let registry = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        registry.migrate()?;
        Ok(registry)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
        "#,
        )
        .map_err(|e| Error::registry(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS fingerprints (
                content_hash TEXT PRIMARY KEY,
                marked_at TEXT NOT NULL
            );

            -- Document store position of the last complete indexing run
            CREATE TABLE IF NOT EXISTS ingest_cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                marker TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )
        .map_err(|e| Error::registry(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }

    /// Whether the chunk is recorded as embedded and indexed
    pub fn exists(&self, hash: &ContentHash) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM fingerprints WHERE content_hash = ?1",
                params![hash.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record a single hash; marking twice is a no-op
    pub fn mark(&self, hash: &ContentHash) -> Result<()> {
        self.mark_many(std::iter::once(hash)).map(|_| ())
    }

    /// Record hashes in one transaction, returning how many were new
    pub fn mark_many<'a, I>(&self, hashes: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ContentHash>,
    {
        let marked_at = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO fingerprints (content_hash, marked_at) VALUES (?1, ?2)",
            )?;
            for hash in hashes {
                added += stmt.execute(params![hash.as_str(), marked_at])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    /// Remove hashes in one transaction, returning how many existed
    pub fn purge_many<'a, I>(&self, hashes: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ContentHash>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM fingerprints WHERE content_hash = ?1")?;
            for hash in hashes {
                removed += stmt.execute(params![hash.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Every recorded hash
    pub fn all(&self) -> Result<HashSet<ContentHash>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT content_hash FROM fingerprints")?;
        let hashes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|row| row.map(ContentHash::from_hex))
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(hashes)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Document-store marker saved by the last complete run
    pub fn marker(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let marker = conn
            .query_row("SELECT marker FROM ingest_cursor WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(marker)
    }

    pub fn set_marker(&self, marker: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO ingest_cursor (id, marker, updated_at) VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET marker = excluded.marker, updated_at = excluded.updated_at
            "#,
            params![marker, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
