use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

/// Deterministic feature-hashing embedder.
///
/// Tokens are lowercased, hashed with blake3, and bucketed into a
/// fixed-dimension count vector that is then L2-normalized. Nowhere near a
/// learned sentence embedding, but it is stable, offline, and preserves enough
/// lexical overlap for tests and air-gapped deployments.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let digest = blake3::hash(token.as_bytes());
            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest.as_bytes()[..8]);
            let bucket = (u64::from_le_bytes(prefix) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stable_and_fixed_width() {
        let embedder = HashingEmbedder::new(64);
        let texts = vec!["court filing deadline".to_string(), "".to_string()];
        let a = embedder.embed(&texts).await.unwrap();
        let b = embedder.embed(&texts).await.unwrap();
        assert_eq!(a.vectors.len(), 2);
        assert!(a.vectors.iter().all(|v| v.len() == 64));
        assert_eq!(a.vectors, b.vectors);
    }

    #[tokio::test]
    async fn similar_text_is_closer_than_unrelated() {
        let embedder = HashingEmbedder::new(128);
        let texts = vec![
            "road maintenance budget for the county".to_string(),
            "county road maintenance budget".to_string(),
            "zebra xylophone quantum".to_string(),
        ];
        let resp = embedder.embed(&texts).await.unwrap();
        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
        };
        let near = dist(&resp.vectors[0], &resp.vectors[1]);
        let far = dist(&resp.vectors[0], &resp.vectors[2]);
        assert!(near < far);
    }
}
