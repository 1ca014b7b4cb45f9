use crate::{
    EmbedResponse, EmbeddingProvider, GenerateRequest, GenerateResponse, GenerationProvider,
    ProviderError,
};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for NoopProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: vec![vec![]; texts.len()],
        })
    }
}

#[async_trait::async_trait]
impl GenerationProvider for NoopProvider {
    async fn generate(&self, _req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
