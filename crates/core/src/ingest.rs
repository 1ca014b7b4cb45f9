use crate::chunker::{self, ChunkError};
use crate::config::ChunkingConfig;
use crate::extractor::{self, ExtractError, FileFormat};
use crate::models::{Document, DocumentType};
use crate::store::DocumentStore;
use crate::vectorstore::{IndexError, VectorIndex};
use providers::{ProviderError, ProviderRegistry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("no extractable text in {0}")]
    EmptyDocument(PathBuf),
    #[error(transparent)]
    Chunking(#[from] ChunkError),
    #[error("embedding failed for {path}: {source}")]
    Embedding {
        path: PathBuf,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("storage failure for {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: String,
    pub title: String,
    pub chunk_count: usize,
    /// True when an earlier document with the same content id was replaced.
    pub replaced: bool,
}

/// Ingestion pipeline: extract, chunk, embed, then store and index as one
/// atomic unit.
///
/// Writes to the store and the vector index happen inside one transaction
/// while holding the index write lock, so concurrent queries never observe a
/// half-ingested document. Same-id ingestion is serialized through a per-id
/// mutex; distinct documents only contend on the final write section.
#[derive(Clone)]
pub struct IngestService {
    store: DocumentStore,
    index: Arc<RwLock<VectorIndex>>,
    index_path: PathBuf,
    registry: ProviderRegistry,
    chunking: ChunkingConfig,
    batch_size: usize,
    doc_locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IngestService {
    pub fn new(
        store: DocumentStore,
        index: Arc<RwLock<VectorIndex>>,
        index_path: PathBuf,
        registry: ProviderRegistry,
        chunking: ChunkingConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            index,
            index_path,
            registry,
            chunking,
            batch_size,
            doc_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn doc_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.doc_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.to_string()).or_default().clone()
    }

    /// Process a single file end to end. A failure here affects only this
    /// document; nothing is persisted for a failed ingestion unit.
    pub async fn ingest_file(
        &self,
        path: &Path,
        doc_type: DocumentType,
        department: &str,
        metadata: HashMap<String, String>,
    ) -> Result<IngestReport, IngestError> {
        info!(path = %path.display(), doc_type = %doc_type, "ingesting document");

        let format = FileFormat::detect(path)?;
        let raw = extractor::extract_text(path, format).await?;
        let content = chunker::normalize(&raw);
        if content.is_empty() {
            return Err(IngestError::EmptyDocument(path.to_path_buf()));
        }

        let id = blake3::hash(content.as_bytes()).to_hex().to_string();
        let chunks = chunker::chunk_text(&content, self.chunking.chunk_size, self.chunking.overlap)?;

        let provider = self
            .registry
            .embedding(None)
            .map_err(|e| IngestError::Embedding {
                path: path.to_path_buf(),
                source: e,
            })?;
        let batch_size = self.batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let resp = provider
                .embed(batch)
                .await
                .map_err(|e| IngestError::Embedding {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            vectors.extend(resp.vectors);
        }

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        let doc = Document {
            id: id.clone(),
            title,
            content,
            doc_type,
            department: department.to_string(),
            upload_date: chrono::Utc::now().timestamp(),
            metadata,
            chunks,
        };

        let report = self.commit(path, doc, vectors).await?;
        info!(
            document_id = %report.document_id,
            chunks = report.chunk_count,
            replaced = report.replaced,
            "document indexed"
        );
        Ok(report)
    }

    /// The write section: replace any previous version of this document,
    /// insert the new rows, and append to the index, all while queries are
    /// excluded by the index write lock.
    async fn commit(
        &self,
        path: &Path,
        doc: Document,
        vectors: Vec<Vec<f32>>,
    ) -> Result<IngestReport, IngestError> {
        let storage_err = |e: sqlx::Error| IngestError::Storage {
            path: path.to_path_buf(),
            source: e.into(),
        };
        let store_err = |e: anyhow::Error| IngestError::Storage {
            path: path.to_path_buf(),
            source: e,
        };

        let lock = self.doc_lock(&doc.id);
        let _id_guard = lock.lock().await;
        let mut index = self.index.write().await;

        // Validate dimensions before touching anything so a mismatch cannot
        // leave the index and store disagreeing.
        for v in &vectors {
            if v.len() != index.dimension() {
                return Err(IndexError::DimensionMismatch {
                    expected: index.dimension(),
                    got: v.len(),
                }
                .into());
            }
        }

        // Checked before the transaction starts: with a single-connection
        // pool (in-memory databases) a pool acquire inside the open
        // transaction would deadlock.
        let replaced = self
            .store
            .document_exists(&doc.id)
            .await
            .map_err(store_err)?;

        let mut tx = self.store.pool().begin().await.map_err(storage_err)?;

        let mut rebuilt: Option<VectorIndex> = None;
        if replaced {
            debug!(document_id = %doc.id, "replacing existing document");
            self.store
                .delete_document_chunks(&mut tx, &doc.id)
                .await
                .map_err(store_err)?;
            let surviving = self
                .store
                .compact_ordinals(&mut tx)
                .await
                .map_err(store_err)?;
            let mut fresh = VectorIndex::new(index.dimension());
            fresh.add(&surviving)?;
            rebuilt = Some(fresh);
        }

        let base_ordinal = rebuilt.as_ref().unwrap_or(&*index).len() as i64;
        self.store
            .put_document(&mut tx, &doc)
            .await
            .map_err(store_err)?;
        self.store
            .insert_chunks(&mut tx, &doc.id, &doc.chunks, &vectors, base_ordinal)
            .await
            .map_err(store_err)?;
        self.store
            .mark_indexed(&mut tx, &doc.id)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(storage_err)?;

        // The transaction is durable; now make the in-memory index match.
        if let Some(fresh) = rebuilt {
            *index = fresh;
        }
        index.add(&vectors)?;
        if let Err(e) = index.save(&self.index_path) {
            // Not fatal: the in-memory index is correct and the snapshot is
            // rebuilt from chunk vectors on the next startup.
            warn!(error = %e, "failed to snapshot vector index");
        }

        Ok(IngestReport {
            document_id: doc.id,
            title: doc.title,
            chunk_count: doc.chunks.len(),
            replaced,
        })
    }

    /// Ingest every supported file under a directory. Individual failures are
    /// logged and skipped so one bad file does not sink the batch.
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        doc_type: DocumentType,
        department: &str,
        metadata: HashMap<String, String>,
    ) -> anyhow::Result<Vec<IngestReport>> {
        let mut reports = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if FileFormat::detect(path).is_err() {
                debug!(path = %path.display(), "skipping unsupported file");
                continue;
            }
            match self
                .ingest_file(path, doc_type, department, metadata.clone())
                .await
            {
                Ok(report) => reports.push(report),
                Err(e) => warn!(path = %path.display(), error = %e, "ingestion failed"),
            }
        }
        Ok(reports)
    }
}
