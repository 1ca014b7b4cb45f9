use crate::config::GenerationConfig;
use crate::models::QueryResult;
use providers::{GenerateRequest, ProviderRegistry};
use std::time::Duration;
use tracing::warn;

/// Returned whenever retrieval produced nothing to ground an answer on.
pub const NO_DOCUMENTS_ANSWER: &str =
    "I couldn't find any relevant documents to answer your question.";

/// How many retrieved chunks make it into the answer context.
const CONTEXT_CHUNKS: usize = 3;
const SNIPPET_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are an assistant for county government operations. \
Answer based on the provided documents.";

/// Turns ranked retrieval results into a natural-language answer.
///
/// Uses the configured generative backend when one is reachable; on any
/// failure, timeout, or absence it degrades to a deterministic extractive
/// summary. This path never returns an error.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    registry: ProviderRegistry,
    generation: GenerationConfig,
}

impl AnswerSynthesizer {
    pub fn new(registry: ProviderRegistry, generation: GenerationConfig) -> Self {
        Self {
            registry,
            generation,
        }
    }

    pub async fn answer(&self, question: &str, results: &[QueryResult]) -> String {
        if results.is_empty() {
            return NO_DOCUMENTS_ANSWER.to_string();
        }

        let provider = if self.generation.provider == "none" {
            None
        } else {
            self.registry.generator(None)
        };

        if let Some(provider) = provider {
            let context = results
                .iter()
                .take(CONTEXT_CHUNKS)
                .map(|r| format!("Document: {}\n{}", r.title, r.chunk))
                .collect::<Vec<_>>()
                .join("\n\n");
            let prompt = format!(
                "Based on the following county documents, answer the question.\n\n\
                 Context Documents:\n{context}\n\nQuestion: {question}\n\n\
                 Provide a detailed answer based on the documents. If the documents \
                 don't contain enough information, say so."
            );
            let req = GenerateRequest {
                prompt,
                system: Some(SYSTEM_PROMPT.to_string()),
                temperature: Some(0.7),
                top_p: Some(0.9),
                top_k: Some(40),
                max_tokens: Some(2048),
            };

            let timeout = Duration::from_secs(self.generation.timeout_secs);
            match tokio::time::timeout(timeout, provider.generate(req)).await {
                Ok(Ok(resp)) if !resp.content.trim().is_empty() => return resp.content,
                Ok(Ok(_)) => warn!("generator returned empty completion, using fallback"),
                Ok(Err(e)) => warn!(error = %e, "generation failed, using fallback"),
                Err(_) => warn!(
                    timeout_secs = self.generation.timeout_secs,
                    "generation timed out, using fallback"
                ),
            }
        }

        extractive_answer(question, results)
    }
}

/// Deterministic fallback: an enumerated digest of the top results.
pub fn extractive_answer(question: &str, results: &[QueryResult]) -> String {
    if results.is_empty() {
        return NO_DOCUMENTS_ANSWER.to_string();
    }
    let mut answer = String::from("Based on the documents in our system:\n\n");
    for (i, result) in results.iter().take(CONTEXT_CHUNKS).enumerate() {
        answer.push_str(&format!(
            "{}. From '{}' ({}):\n   {}...\n\n",
            i + 1,
            result.title,
            result.department,
            snippet(&result.chunk, SNIPPET_CHARS)
        ));
    }
    answer.push_str(&format!(
        "\nThese documents may contain the information you're looking for regarding: {question}"
    ));
    answer
}

fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::models::QueryResult;
    use providers::noop::NoopProvider;
    use providers::ProviderRegistry;
    use std::sync::Arc;

    fn result(title: &str, chunk: &str) -> QueryResult {
        QueryResult {
            document_id: format!("id-{title}"),
            title: title.to_string(),
            department: "County Clerk".to_string(),
            doc_type: "policy".to_string(),
            chunk: chunk.to_string(),
            relevance_score: 0.9,
        }
    }

    fn generation(provider: &str) -> GenerationConfig {
        GenerationConfig {
            provider: provider.to_string(),
            model: "test".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn empty_results_yield_fixed_message() {
        let synth = AnswerSynthesizer::new(ProviderRegistry::new(), generation("none"));
        assert_eq!(synth.answer("anything?", &[]).await, NO_DOCUMENTS_ANSWER);
    }

    #[tokio::test]
    async fn no_backend_falls_back_to_extractive() {
        let synth = AnswerSynthesizer::new(ProviderRegistry::new(), generation("none"));
        let results = vec![
            result("Budget Policy", "The annual budget is adopted in September."),
            result("Road Plan", "Resurfacing is scheduled each spring."),
            result("FOIA Guide", "Requests are answered within ten days."),
            result("Ignored", "Only the top three are cited."),
        ];
        let answer = synth.answer("When is the budget adopted?", &results).await;
        assert!(!answer.is_empty());
        assert!(answer.contains("Budget Policy"));
        assert!(answer.contains("Road Plan"));
        assert!(answer.contains("FOIA Guide"));
        assert!(!answer.contains("Ignored"));
    }

    #[tokio::test]
    async fn failing_backend_falls_back_to_extractive() {
        let registry = ProviderRegistry::new()
            .with_generator("noop", Arc::new(NoopProvider))
            .set_preferred_generator("noop");
        let synth = AnswerSynthesizer::new(registry, generation("noop"));
        let results = vec![result("Court Calendar", "Hearings resume Monday.")];
        let answer = synth.answer("When do hearings resume?", &results).await;
        assert!(answer.contains("Court Calendar"));
        assert!(answer.contains("Hearings resume Monday."));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(300);
        assert_eq!(snippet(&text, 200).chars().count(), 200);
        assert_eq!(snippet("short", 200), "short");
    }
}
