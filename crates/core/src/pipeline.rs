use crate::answer::AnswerSynthesizer;
use crate::config::AppConfig;
use crate::ingest::IngestService;
use crate::retrieval::RetrievalEngine;
use crate::store::DocumentStore;
use crate::vectorstore::VectorIndex;
use anyhow::Context;
use providers::hashing::HashingEmbedder;
use providers::ollama::{OllamaConfig, OllamaProvider};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Process-scoped application state: database pool, vector index, and
/// provider registry, initialized explicitly and injected into the services.
pub struct App {
    pub config: AppConfig,
    store: DocumentStore,
    index: Arc<RwLock<VectorIndex>>,
    registry: ProviderRegistry,
}

impl App {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = storage::connect(&config.database.path)
            .await
            .context("db connect")?;
        storage::migrate(&pool).await.context("db migrate")?;
        let store = DocumentStore::new(pool);
        let registry = build_registry(&config);
        let index = open_index(&config, &store).await?;
        Ok(Self {
            config,
            store,
            index: Arc::new(RwLock::new(index)),
            registry,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn ingester(&self) -> IngestService {
        IngestService::new(
            self.store.clone(),
            self.index.clone(),
            PathBuf::from(&self.config.index.path),
            self.registry.clone(),
            self.config.chunking.clone(),
            self.config.embeddings.batch_size,
        )
    }

    pub fn retriever(&self) -> RetrievalEngine {
        RetrievalEngine::new(self.store.clone(), self.index.clone(), self.registry.clone())
    }

    pub fn synthesizer(&self) -> AnswerSynthesizer {
        AnswerSynthesizer::new(self.registry.clone(), self.config.generation.clone())
    }
}

/// Load the index snapshot, or create a fresh one. If the snapshot disagrees
/// with the store's chunk count (crash between commit and save, deleted
/// file), rebuild it from the stored chunk vectors in ordinal order.
async fn open_index(config: &AppConfig, store: &DocumentStore) -> anyhow::Result<VectorIndex> {
    let path = PathBuf::from(&config.index.path);
    let dimension = config.embeddings.dimension;
    let chunk_count = store.chunk_count().await? as usize;

    let mut index = match VectorIndex::load(&path) {
        Ok(index) if index.dimension() == dimension => index,
        Ok(index) => {
            warn!(
                snapshot_dim = index.dimension(),
                configured_dim = dimension,
                "index snapshot has a different dimension, rebuilding"
            );
            VectorIndex::new(dimension)
        }
        Err(_) if chunk_count == 0 => VectorIndex::new(dimension),
        Err(e) => {
            warn!(error = %e, "could not load index snapshot, rebuilding from store");
            VectorIndex::new(dimension)
        }
    };

    if index.len() != chunk_count {
        info!(
            index_len = index.len(),
            chunk_count, "index out of sync with store, rebuilding"
        );
        let vectors = store.chunk_vectors_in_order().await?;
        let mut rebuilt = VectorIndex::new(dimension);
        rebuilt.add(&vectors)?;
        if let Err(e) = rebuilt.save(&path) {
            warn!(error = %e, "failed to snapshot rebuilt index");
        }
        index = rebuilt;
    }
    Ok(index)
}

/// Wire up providers from config and environment, teacher-style: the hash
/// embedder is always available, HTTP backends register when reachable
/// configuration exists.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_embedding(
        "hash",
        Arc::new(HashingEmbedder::new(config.embeddings.dimension)),
    );

    let ollama_base = std::env::var("OLLAMA_URL")
        .ok()
        .unwrap_or_else(|| "http://localhost:11434".to_string());
    let ollama = OllamaProvider::new(OllamaConfig {
        base_url: ollama_base,
        model: config.generation.model.clone(),
        embedding_model: config.embeddings.model.clone(),
        timeout_secs: config.generation.timeout_secs,
    });
    reg = reg
        .with_embedding("ollama", Arc::new(ollama.clone()))
        .with_generator("ollama", Arc::new(ollama));

    if let (Ok(key), Ok(base)) = (
        std::env::var("OPENAI_API_KEY"),
        std::env::var("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key,
            base_url: base,
            embedding_model: config.embeddings.model.clone(),
            chat_model: config.generation.model.clone(),
            timeout_secs: config.generation.timeout_secs,
        });
        reg = reg
            .with_embedding("openai", Arc::new(provider.clone()))
            .with_generator("openai", Arc::new(provider));
    }

    reg = reg.set_preferred_embedding(&config.embeddings.provider);
    if config.generation.provider != "none" {
        reg = reg.set_preferred_generator(&config.generation.provider);
    }
    reg
}
