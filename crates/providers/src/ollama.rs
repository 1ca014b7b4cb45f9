use crate::{
    EmbedResponse, EmbeddingProvider, GenerateRequest, GenerateResponse, GenerationProvider,
    ProviderError,
};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Hard cap on a single generate call; Ollama can otherwise stall for
    /// minutes while loading a model.
    pub timeout_secs: u64,
}

/// Client for a local Ollama instance (`/api/generate`, `/api/embeddings`).
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    cfg: Arc<OllamaConfig>,
}

impl OllamaProvider {
    pub fn new(cfg: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    model: Option<String>,
    total_duration: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl GenerationProvider for OllamaProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        #[derive(serde::Serialize)]
        struct Options {
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            top_p: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            top_k: Option<u32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            num_predict: Option<u32>,
        }
        #[derive(serde::Serialize)]
        struct Body<'a> {
            model: &'a str,
            prompt: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            system: Option<&'a str>,
            stream: bool,
            options: Options,
        }

        let body = Body {
            model: &self.cfg.model,
            prompt: &req.prompt,
            system: req.system.as_deref(),
            stream: false,
            options: Options {
                temperature: req.temperature,
                top_p: req.top_p,
                top_k: req.top_k,
                num_predict: req.max_tokens,
            },
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.cfg.base_url))
            .timeout(Duration::from_secs(self.cfg.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.cfg.timeout_secs)
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {}",
                status, text
            )));
        }

        let parsed: OllamaGenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        tracing::debug!(
            model = parsed.model.as_deref().unwrap_or(&self.cfg.model),
            eval_count = parsed.eval_count,
            "ollama generate complete"
        );

        Ok(GenerateResponse {
            content: parsed.response,
            model: parsed.model.unwrap_or_else(|| self.cfg.model.clone()),
            total_duration_ms: parsed.total_duration.map(|ns| ns / 1_000_000),
            eval_count: parsed.eval_count,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        // The embeddings endpoint takes one prompt per call.
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            #[derive(serde::Serialize)]
            struct Body<'a> {
                model: &'a str,
                prompt: &'a str,
            }
            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.cfg.base_url))
                .timeout(Duration::from_secs(self.cfg.timeout_secs))
                .json(&Body {
                    model: &self.cfg.embedding_model,
                    prompt: text,
                })
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(ProviderError::RequestFailed(format!(
                    "status {} body {}",
                    status, text
                )));
            }

            let parsed: OllamaEmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
            vectors.push(parsed.embedding);
        }
        Ok(EmbedResponse { vectors })
    }
}
