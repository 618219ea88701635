//! Answer generation: the trait consumed by the pipeline, context/prompt
//! assembly, and the Gemini-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

const PROMPT_TEMPLATE: &str = "You are a document question-answering assistant.\n\
Answer using the document context below when it is relevant; when it is not, \
answer from general knowledge without apologizing for missing documents. \
Weave document insights in naturally instead of citing \"the provided documents\". \
Use markdown formatting when it improves readability and keep the answer focused.\n\n\
=== DOCUMENT CONTEXT ===\n{context}\n\n\
=== USER'S QUESTION ===\n{question}\n\n\
Answer:";

/// Generates an answer grounded in retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Whether the generator has everything it needs (credentials, model).
    /// The pipeline short-circuits with an explanatory answer when false.
    fn is_configured(&self) -> bool;

    /// Produces an answer for `question` given the ordered retrieved context
    /// and optional side-channel text (e.g. OCR output from an image).
    async fn generate(
        &self,
        question: &str,
        context_texts: &[String],
        side_channel_text: Option<&str>,
    ) -> Result<String, RagError>;
}

/// Joins context chunks (and any side-channel text) into the single context
/// block fed to the model, preserving retrieval order.
pub fn build_context(context_texts: &[String], side_channel_text: Option<&str>) -> String {
    let mut parts: Vec<String> = context_texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[Document {}]\n{}", i + 1, text))
        .collect();
    if let Some(extra) = side_channel_text {
        parts.push(format!("[Additional Context - User Provided Image]\n{extra}"));
    }
    parts.join("\n\n---\n\n")
}

fn build_prompt(question: &str, context: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL, api_key, model)
    }

    /// Overridable endpoint, used by tests and self-hosted gateways.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(
        &self,
        question: &str,
        context_texts: &[String],
        side_channel_text: Option<&str>,
    ) -> Result<String, RagError> {
        if !self.is_configured() {
            return Err(RagError::GeneratorUnconfigured);
        }

        let context = build_context(context_texts, side_channel_text);
        let prompt = build_prompt(question, &context);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "generation request failed ({status}): {detail}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;
        let answer = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text.trim().to_string())
            .filter(|text| !text.is_empty());

        Ok(answer.unwrap_or_else(|| {
            "I could not generate an answer. Please try rephrasing your question.".to_string()
        }))
    }
}

/// Deterministic generator for tests: echoes how much context it saw.
///
/// Construct with `configured = false` to exercise the pipeline's
/// unconfigured short-circuit.
pub struct MockAnswerGenerator {
    configured: bool,
}

impl MockAnswerGenerator {
    pub fn new() -> Self {
        Self { configured: true }
    }

    pub fn unconfigured() -> Self {
        Self { configured: false }
    }
}

impl Default for MockAnswerGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for MockAnswerGenerator {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(
        &self,
        question: &str,
        context_texts: &[String],
        side_channel_text: Option<&str>,
    ) -> Result<String, RagError> {
        if !self.configured {
            return Err(RagError::GeneratorUnconfigured);
        }
        Ok(format!(
            "answer to '{question}' from {} context chunks{}",
            context_texts.len(),
            if side_channel_text.is_some() {
                " plus side-channel text"
            } else {
                ""
            }
        ))
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_preserves_retrieval_order() {
        let chunks = vec!["first chunk".to_string(), "second chunk".to_string()];
        let context = build_context(&chunks, None);
        assert!(context.starts_with("[Document 1]\nfirst chunk"));
        assert!(context.contains("[Document 2]\nsecond chunk"));
        let first = context.find("first chunk").unwrap();
        let second = context.find("second chunk").unwrap();
        assert!(first < second);
    }

    #[test]
    fn side_channel_text_lands_after_documents() {
        let chunks = vec!["chunk".to_string()];
        let context = build_context(&chunks, Some("ocr output"));
        assert!(context.ends_with("[Additional Context - User Provided Image]\nocr output"));
    }

    #[test]
    fn prompt_embeds_question_and_context() {
        let prompt = build_prompt("what is this?", "[Document 1]\nsome text");
        assert!(prompt.contains("what is this?"));
        assert!(prompt.contains("[Document 1]\nsome text"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn unconfigured_gemini_reports_itself() {
        let generator = GeminiGenerator::new("", "gemini-test");
        assert!(!generator.is_configured());
        let generator = GeminiGenerator::new("key", "gemini-test");
        assert!(generator.is_configured());
    }
}
