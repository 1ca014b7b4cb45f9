use crate::models::{DocumentType, QueryResult};
use crate::store::DocumentStore;
use crate::vectorstore::VectorIndex;
use anyhow::Context;
use providers::ProviderRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Read-only query path: embed, nearest-neighbor search, hydrate, filter.
#[derive(Clone)]
pub struct RetrievalEngine {
    store: DocumentStore,
    index: Arc<RwLock<VectorIndex>>,
    registry: ProviderRegistry,
}

impl RetrievalEngine {
    pub fn new(
        store: DocumentStore,
        index: Arc<RwLock<VectorIndex>>,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            store,
            index,
            registry,
        }
    }

    /// Return up to `top_k` scored chunks for a query.
    ///
    /// Filters are applied after the nearest-neighbor search; a hit that
    /// fails a filter is dropped, not replaced, so fewer than `top_k`
    /// results can come back when filters are active.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        department: Option<&str>,
        doc_type: Option<DocumentType>,
    ) -> anyhow::Result<Vec<QueryResult>> {
        let provider = self.registry.embedding(None)?;
        let resp = provider.embed(&[query.to_string()]).await?;
        let query_vector = resp
            .vectors
            .into_iter()
            .next()
            .context("embedding provider returned no vector for query")?;

        // Hold the read lock across hydration so the hits resolve against the
        // same store state the index reflected.
        let index = self.index.read().await;
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let hits = index.search(&query_vector, top_k)?;
        debug!(query, hits = hits.len(), "vector search complete");

        let mut results = Vec::with_capacity(hits.len());
        for (ordinal, distance) in hits {
            let Some(chunk) = self.store.get_chunk_by_ordinal(ordinal as i64).await? else {
                // Should be unreachable given the ingestion invariants.
                warn!(ordinal, "index ordinal has no chunk row");
                continue;
            };
            if let Some(dept) = department {
                if chunk.department != dept {
                    continue;
                }
            }
            if let Some(dtype) = doc_type {
                if chunk.doc_type != dtype.as_str() {
                    continue;
                }
            }
            results.push(chunk.into_result(distance));
        }
        Ok(results)
    }
}
