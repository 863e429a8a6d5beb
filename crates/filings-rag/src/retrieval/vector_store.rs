//! Persistent vector store for chunk embeddings
//!
//! Records live in a SQLite table and are mirrored into an in-memory
//! snapshot on open. `add` commits one transaction and only then
//! publishes the new records into the snapshot under a write lock, so a
//! concurrent `search` observes either none or all of an add.

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::providers::vector_index::{AddOutcome, EmbeddingRecord, ScoredChunk};
use crate::types::{Chunk, ContentHash, DocumentRef, SearchFilter};

/// One indexed record with its precomputed norm
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f64,
}

#[derive(Default)]
struct Snapshot {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
    positions: HashMap<ContentHash, usize>,
}

impl Snapshot {
    fn push(&mut self, entry: IndexEntry) {
        self.positions
            .insert(entry.chunk.content_hash.clone(), self.entries.len());
        self.entries.push(entry);
    }
}

/// SQLite-backed vector store with brute-force cosine search
pub struct VectorStore {
    /// Write connection; holding it is the single-writer lock
    conn: Mutex<Connection>,
    /// Records visible to readers
    snapshot: RwLock<Snapshot>,
}

impl VectorStore {
    /// Create or open the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            Error::VectorIndex(format!("Failed to open index {}: {}", path.display(), e))
        })?;
        let store = Self::with_connection(conn)?;

        tracing::info!(
            "Vector index opened at {} ({} records)",
            path.display(),
            store.len()
        );
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        let snapshot = load_snapshot(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Add records, dropping any whose content hash is already indexed
    pub fn add(&self, records: Vec<EmbeddingRecord>) -> Result<AddOutcome> {
        let mut outcome = AddOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.conn.lock();

        let mut fresh = Vec::with_capacity(records.len());
        {
            let snapshot = self.snapshot.read();
            let expected = snapshot
                .dimensions
                .or_else(|| records.first().map(|r| r.vector.len()));
            let mut seen = HashSet::with_capacity(records.len());

            for record in records {
                let norm = validate_vector(&record.vector)?;
                if let Some(expected) = expected {
                    if record.vector.len() != expected {
                        return Err(Error::DimensionMismatch {
                            expected,
                            actual: record.vector.len(),
                        });
                    }
                }

                let hash = record.content_hash().clone();
                if snapshot.positions.contains_key(&hash) || !seen.insert(hash.clone()) {
                    outcome.duplicates.push(hash);
                    continue;
                }

                fresh.push(IndexEntry {
                    chunk: record.chunk,
                    vector: record.vector,
                    norm,
                });
            }
        }

        if fresh.is_empty() {
            return Ok(outcome);
        }

        let created_at = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO embeddings (
                    content_hash, entity_id, doc_type, published_date, source_url,
                    offset_start, offset_end, text, dimension, vector, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;

            for entry in &fresh {
                let chunk = &entry.chunk;
                let changed = stmt.execute(params![
                    chunk.content_hash.as_str(),
                    chunk.document.entity_id,
                    chunk.document.doc_type,
                    chunk.document.published_date,
                    chunk.document.source_url,
                    chunk.offset_start as i64,
                    chunk.offset_end as i64,
                    chunk.text,
                    entry.vector.len() as i64,
                    encode_vector(&entry.vector),
                    created_at,
                ])?;
                if changed == 0 {
                    return Err(Error::ConsistencyViolation(format!(
                        "record {} is stored on disk but missing from the loaded index",
                        chunk.content_hash
                    )));
                }
            }
        }
        tx.commit()?;

        let mut snapshot = self.snapshot.write();
        for entry in fresh {
            snapshot.dimensions.get_or_insert(entry.vector.len());
            outcome.inserted.push(entry.chunk.content_hash.clone());
            snapshot.push(entry);
        }
        drop(conn);

        tracing::debug!(
            "Index add: {} inserted, {} duplicates dropped",
            outcome.inserted.len(),
            outcome.duplicates.len()
        );
        Ok(outcome)
    }

    /// Up to `k` records most similar to `query`, restricted to `filter`
    pub fn search(&self, query: &[f32], k: usize, filter: &SearchFilter) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_norm = validate_vector(query)?;

        let snapshot = self.snapshot.read();
        let Some(dimensions) = snapshot.dimensions else {
            return Ok(Vec::new());
        };
        if query.len() != dimensions {
            return Err(Error::DimensionMismatch {
                expected: dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = snapshot
            .entries
            .iter()
            .filter(|entry| filter.matches(&entry.chunk.document))
            .map(|entry| (cosine(query, query_norm, entry), entry))
            .collect();

        scored.sort_by(|a, b| rank_order((a.0, &a.1.chunk), (b.0, &b.1.chunk)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Latest published date among records passing `filter`
    pub fn latest_published_date(&self, filter: &SearchFilter) -> Option<NaiveDate> {
        self.snapshot
            .read()
            .entries
            .iter()
            .map(|entry| &entry.chunk.document)
            .filter(|document| filter.matches(document))
            .map(|document| document.published_date)
            .max()
    }

    /// Get an indexed chunk by content hash
    pub fn get(&self, hash: &ContentHash) -> Option<Chunk> {
        let snapshot = self.snapshot.read();
        snapshot
            .positions
            .get(hash)
            .map(|&pos| snapshot.entries[pos].chunk.clone())
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.snapshot.read().positions.contains_key(hash)
    }

    pub fn content_hashes(&self) -> HashSet<ContentHash> {
        self.snapshot.read().positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.snapshot.read().dimensions
    }
}

/// Descending score, then newer filing, then content hash
fn rank_order(a: (f32, &Chunk), b: (f32, &Chunk)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| b.1.document.published_date.cmp(&a.1.document.published_date))
        .then_with(|| a.1.content_hash.cmp(&b.1.content_hash))
}

fn cosine(query: &[f32], query_norm: f64, entry: &IndexEntry) -> f32 {
    let dot: f64 = query
        .iter()
        .zip(entry.vector.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    (dot / (query_norm * entry.norm)).clamp(-1.0, 1.0) as f32
}

/// Reject vectors cosine similarity is undefined for; returns the L2 norm
fn validate_vector(vector: &[f32]) -> Result<f64> {
    if vector.is_empty() {
        return Err(Error::vector_index("vector is empty"));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::vector_index("vector contains non-finite values"));
    }
    let norm = vector
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt();
    if norm <= f64::EPSILON {
        return Err(Error::vector_index("vector has zero norm"));
    }
    Ok(norm)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>> {
    if blob.len() != dimension * std::mem::size_of::<f32>() {
        return Err(Error::VectorIndex(format!(
            "invalid vector byte length: expected {}, got {}",
            dimension * std::mem::size_of::<f32>(),
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=FULL;

        CREATE TABLE IF NOT EXISTS embeddings (
            content_hash TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            published_date TEXT NOT NULL,
            source_url TEXT NOT NULL,
            offset_start INTEGER NOT NULL,
            offset_end INTEGER NOT NULL,
            text TEXT NOT NULL,
            dimension INTEGER NOT NULL,
            vector BLOB NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_embeddings_filing
            ON embeddings(entity_id, doc_type, published_date);
        "#,
    )
    .map_err(|e| Error::VectorIndex(format!("Failed to run migrations: {}", e)))
}

fn load_snapshot(conn: &Connection) -> Result<Snapshot> {
    let mut stmt = conn.prepare(
        r#"
        SELECT content_hash, entity_id, doc_type, published_date, source_url,
               offset_start, offset_end, text, dimension, vector
        FROM embeddings
        ORDER BY rowid
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        let hash: String = row.get(0)?;
        let document = DocumentRef {
            entity_id: row.get(1)?,
            doc_type: row.get(2)?,
            published_date: row.get(3)?,
            source_url: row.get(4)?,
        };
        let offset_start: i64 = row.get(5)?;
        let offset_end: i64 = row.get(6)?;
        let text: String = row.get(7)?;
        let dimension: i64 = row.get(8)?;
        let blob: Vec<u8> = row.get(9)?;

        Ok((
            Chunk {
                document,
                offset_start: offset_start as usize,
                offset_end: offset_end as usize,
                text,
                content_hash: ContentHash::from_hex(hash),
            },
            dimension as usize,
            blob,
        ))
    })?;

    let mut snapshot = Snapshot::default();
    for row in rows {
        let (chunk, dimension, blob) = row?;
        match snapshot.dimensions {
            Some(expected) if expected != dimension => {
                return Err(Error::ConsistencyViolation(format!(
                    "record {} has dimension {}, index uses {}",
                    chunk.content_hash, dimension, expected
                )));
            }
            _ => snapshot.dimensions = Some(dimension),
        }
        let vector = decode_vector(&blob, dimension)?;
        let norm = validate_vector(&vector)?;
        snapshot.push(IndexEntry {
            chunk,
            vector,
            norm,
        });
    }

    Ok(snapshot)
}
