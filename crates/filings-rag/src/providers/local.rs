//! Local provider implementations using SQLite and the filesystem
//!
//! These wrap the sync `VectorStore` and read cleaned filings from disk.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::retrieval::VectorStore;
use crate::types::{ContentHash, Document, SearchFilter};

use super::document_store::{DocumentBatch, DocumentStore};
use super::vector_index::{AddOutcome, EmbeddingRecord, ScoredChunk, VectorIndex};

/// Local vector index wrapping the SQLite-backed store
pub struct LocalVectorIndex {
    store: Arc<VectorStore>,
}

impl LocalVectorIndex {
    /// Create from an existing store
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Open the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Arc::new(VectorStore::open(path)?)))
    }

    /// Get underlying store for direct access
    pub fn inner(&self) -> &Arc<VectorStore> {
        &self.store
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&VectorStore) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&*store))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<AddOutcome> {
        self.blocking(move |store| store.add(records)).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let query = query_vector.to_vec();
        let filter = filter.clone();
        self.blocking(move |store| store.search(&query, k, &filter)).await
    }

    async fn latest_published_date(&self, filter: &SearchFilter) -> Result<Option<NaiveDate>> {
        let filter = filter.clone();
        self.blocking(move |store| Ok(store.latest_published_date(&filter)))
            .await
    }

    async fn contains(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.store.contains(hash))
    }

    async fn content_hashes(&self) -> Result<HashSet<ContentHash>> {
        self.blocking(|store| Ok(store.content_hashes())).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.store.len())
    }

    async fn dimensions(&self) -> Result<Option<usize>> {
        Ok(self.store.dimensions())
    }

    fn name(&self) -> &str {
        "local-sqlite"
    }
}

/// Document store over a directory of cleaned filing JSON files
///
/// The marker is the latest file modification time handed out, in
/// milliseconds since the epoch. Files modified at exactly the marker
/// are listed again on the next call; their chunks are already
/// fingerprinted and get skipped.
pub struct DirectoryDocumentStore {
    root: PathBuf,
}

impl DirectoryDocumentStore {
    /// Create a store reading from `root`, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(root: &Path, since: Option<u128>) -> Result<DocumentBatch> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                Error::document_store(format!("Failed to walk {}: {}", root.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_json = entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if !is_json {
                continue;
            }

            let modified = entry
                .metadata()
                .map_err(|e| Error::document_store(format!("Failed to stat {}: {}", entry.path().display(), e)))?
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);

            if since.map_or(true, |marker| modified >= marker) {
                files.push((entry.into_path(), modified));
            }
        }
        files.sort();

        let mut batch = DocumentBatch::default();
        let mut latest: Option<u128> = None;
        for (path, modified) in files {
            latest = Some(latest.map_or(modified, |l| l.max(modified)));
            match read_document(&path) {
                Ok(document) => batch.documents.push(document),
                Err(e) => {
                    tracing::warn!("Skipping filing: {}", e);
                    batch.skipped += 1;
                }
            }
        }
        batch.next_marker = latest.map(|l| l.to_string());
        Ok(batch)
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let location = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| Error::malformed(&location, e.to_string()))?;
    let document: Document =
        serde_json::from_slice(&bytes).map_err(|e| Error::malformed(&location, e.to_string()))?;

    if document.entity_id.trim().is_empty() {
        return Err(Error::malformed(location, "missing entity id"));
    }
    if document.doc_type.trim().is_empty() {
        return Err(Error::malformed(location, "missing document type"));
    }
    Ok(document)
}

fn parse_marker<T: std::str::FromStr>(marker: Option<&str>) -> Result<Option<T>> {
    marker
        .map(|m| {
            m.trim()
                .parse::<T>()
                .map_err(|_| Error::document_store(format!("Invalid marker: {}", m)))
        })
        .transpose()
}

#[async_trait]
impl DocumentStore for DirectoryDocumentStore {
    async fn list_new_documents(&self, since_marker: Option<&str>) -> Result<DocumentBatch> {
        let since = parse_marker::<u128>(since_marker)?;
        let root = self.root.clone();
        let batch = tokio::task::spawn_blocking(move || Self::scan(&root, since))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        tracing::info!(
            "Listed {} new filings from {} ({} skipped)",
            batch.documents.len(),
            self.root.display(),
            batch.skipped
        );
        Ok(batch)
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// In-process document store fed by `submit`
///
/// The marker is the number of submissions already handed out.
/// Submitting a document again makes it new again.
#[derive(Default)]
pub struct MemoryDocumentStore {
    submissions: Mutex<Vec<Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document to the submission log
    pub fn submit(&self, document: Document) {
        self.submissions.lock().push(document);
    }

    pub fn submit_many(&self, documents: impl IntoIterator<Item = Document>) {
        self.submissions.lock().extend(documents);
    }

    pub fn len(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_new_documents(&self, since_marker: Option<&str>) -> Result<DocumentBatch> {
        let consumed = parse_marker::<usize>(since_marker)?.unwrap_or(0);
        let submissions = self.submissions.lock();
        let start = consumed.min(submissions.len());
        let documents = submissions[start..].to_vec();

        Ok(DocumentBatch {
            next_marker: (!documents.is_empty()).then(|| submissions.len().to_string()),
            documents,
            skipped: 0,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
