//! Orchestration of ingestion and querying.
//!
//! The pipeline composes the chunker, embedding provider, vector store, and
//! answer generator into two deterministic sequences: ingest a document,
//! answer a question. Both are soft-fail boundaries: every internal failure
//! becomes a structured outcome, never a propagated error, so one bad
//! document or query cannot take the service down.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::chunking::TextChunker;
use crate::embeddings::EmbeddingProvider;
use crate::extract::{DocumentExtractor, fetch_remote};
use crate::generation::AnswerGenerator;
use crate::stores::{SearchResult, StoredChunk, VectorStore};
use crate::types::RagError;

/// Context stand-in passed to the generator when retrieval finds nothing, so
/// it still attempts a knowledge-only answer.
pub const NO_CONTEXT_PLACEHOLDER: &str = "[NO DOCUMENTS UPLOADED OR NO RELEVANT CONTEXT FOUND]";

const UNCONFIGURED_ANSWER: &str =
    "Error: the answer generator is not configured. Set GEMINI_API_KEY to enable generation.";

const PREVIEW_CHAR_LIMIT: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Error,
}

/// Outcome of one document ingestion. Always well-formed, even on failure.
#[derive(Clone, Debug, Serialize)]
pub struct IngestOutcome {
    pub origin_id: String,
    pub origin_name: String,
    pub status: IngestStatus,
    pub chunk_count: usize,
    pub message: String,
}

/// One ranked source backing an answer.
#[derive(Clone, Debug, Serialize)]
pub struct SourceRef {
    pub origin_id: String,
    pub origin_name: String,
    pub sequence_index: usize,
    /// Cosine similarity rounded to 4 decimal places.
    pub score: f32,
    pub text_preview: String,
}

impl SourceRef {
    fn from_result(result: &SearchResult) -> Self {
        Self {
            origin_id: result.chunk.origin_id.clone(),
            origin_name: result.chunk.origin_name.clone(),
            sequence_index: result.chunk.sequence_index,
            score: round_score(result.score),
            text_preview: preview(&result.chunk.text),
        }
    }
}

/// Outcome of one query. On failure `answer` carries the failure description
/// and `sources` is empty.
#[derive(Clone, Debug, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub side_channel_text: Option<String>,
}

/// Composes chunking, embedding, indexing, and generation.
pub struct RagPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
    extractor: DocumentExtractor,
    http: reqwest::Client,
    default_top_k: usize,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Ingests already-extracted text under the given origin identity.
    ///
    /// Chunks, batch-embeds (one provider call per document), and inserts in
    /// a single store call so partial ingestion is never observable.
    pub async fn ingest(
        &self,
        origin_id: &str,
        origin_name: &str,
        extracted_text: &str,
    ) -> IngestOutcome {
        match self.try_ingest(origin_id, origin_name, extracted_text).await {
            Ok(chunk_count) => IngestOutcome {
                origin_id: origin_id.to_string(),
                origin_name: origin_name.to_string(),
                status: IngestStatus::Success,
                chunk_count,
                message: format!("successfully indexed {chunk_count} chunks"),
            },
            Err(err) => {
                tracing::warn!(origin_id, origin_name, %err, "ingestion failed");
                IngestOutcome {
                    origin_id: origin_id.to_string(),
                    origin_name: origin_name.to_string(),
                    status: IngestStatus::Error,
                    chunk_count: 0,
                    message: err.to_string(),
                }
            }
        }
    }

    /// Ingests text under a freshly generated origin id.
    pub async fn ingest_named(&self, origin_name: &str, extracted_text: &str) -> IngestOutcome {
        let origin_id = uuid::Uuid::new_v4().to_string();
        self.ingest(&origin_id, origin_name, extracted_text).await
    }

    /// Extracts a local file and ingests it. Unsupported formats come back
    /// as error outcomes, not panics.
    pub async fn ingest_path(&self, path: &Path) -> IngestOutcome {
        let origin_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        match self.extractor.extract(path) {
            Ok(text) => self.ingest_named(&origin_name, &text).await,
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "extraction failed");
                IngestOutcome {
                    origin_id: uuid::Uuid::new_v4().to_string(),
                    origin_name,
                    status: IngestStatus::Error,
                    chunk_count: 0,
                    message: err.to_string(),
                }
            }
        }
    }

    /// Downloads a remote document and ingests it under its URL.
    pub async fn ingest_url(&self, url: &Url) -> IngestOutcome {
        match fetch_remote(&self.http, url).await {
            Ok(text) => self.ingest_named(url.as_str(), &text).await,
            Err(err) => {
                tracing::warn!(%err, %url, "remote fetch failed");
                IngestOutcome {
                    origin_id: uuid::Uuid::new_v4().to_string(),
                    origin_name: url.as_str().to_string(),
                    status: IngestStatus::Error,
                    chunk_count: 0,
                    message: err.to_string(),
                }
            }
        }
    }

    async fn try_ingest(
        &self,
        origin_id: &str,
        origin_name: &str,
        extracted_text: &str,
    ) -> Result<usize, RagError> {
        if extracted_text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }

        let chunks = self.chunker.chunk(extracted_text)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyInput);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let stored: Vec<StoredChunk> = chunks
            .iter()
            .map(|chunk| {
                StoredChunk::new(origin_id, origin_name, chunk.text.clone(), chunk.sequence_index)
            })
            .collect();
        let chunk_count = stored.len();

        self.store.insert(stored, vectors).await?;
        tracing::info!(origin_id, origin_name, chunk_count, "ingested document");
        Ok(chunk_count)
    }

    /// Answers a question against the indexed corpus.
    ///
    /// Side-channel text (e.g. OCR output from an attached image) joins the
    /// question for the query embedding only; the generator receives the
    /// original question unchanged.
    pub async fn answer(
        &self,
        question: &str,
        top_k: Option<usize>,
        side_channel_text: Option<String>,
    ) -> QueryOutcome {
        match self
            .try_answer(question, top_k, side_channel_text.as_deref())
            .await
        {
            Ok((answer, sources)) => QueryOutcome {
                answer,
                sources,
                side_channel_text,
            },
            Err(err) => {
                tracing::warn!(%err, "query failed");
                QueryOutcome {
                    answer: format!("An error occurred while processing your query: {err}"),
                    sources: Vec::new(),
                    side_channel_text,
                }
            }
        }
    }

    async fn try_answer(
        &self,
        question: &str,
        top_k: Option<usize>,
        side_channel_text: Option<&str>,
    ) -> Result<(String, Vec<SourceRef>), RagError> {
        let top_k = top_k.unwrap_or(self.default_top_k);

        let query_text = match side_channel_text {
            Some(extra) => format!("{question}\n\nAdditional context from image:\n{extra}"),
            None => question.to_string(),
        };
        let query_vector = self.embedder.embed(&query_text).await?;

        let results = self.store.search(&query_vector, top_k).await?;
        let sources: Vec<SourceRef> = results.iter().map(SourceRef::from_result).collect();
        let context: Vec<String> = results.into_iter().map(|result| result.chunk.text).collect();

        if !self.generator.is_configured() {
            // Sources stay: retrieval worked, only generation is unavailable.
            return Ok((UNCONFIGURED_ANSWER.to_string(), sources));
        }

        let context = if context.is_empty() {
            vec![NO_CONTEXT_PLACEHOLDER.to_string()]
        } else {
            context
        };
        let answer = self
            .generator
            .generate(question, &context, side_channel_text)
            .await?;
        Ok((answer, sources))
    }

    /// Removes every indexed chunk of the given origin document.
    pub async fn delete_document(&self, origin_id: &str) -> Result<usize, RagError> {
        self.store.delete_by_origin(origin_id).await
    }

    /// Clears the whole index.
    pub async fn clear_all(&self) -> Result<(), RagError> {
        self.store.clear().await
    }

    /// Number of chunks currently indexed.
    pub async fn document_count(&self) -> Result<usize, RagError> {
        self.store.count().await
    }
}

/// Builder for [`RagPipeline`] instances.
#[derive(Default)]
pub struct RagPipelineBuilder {
    chunker: Option<TextChunker>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    default_top_k: Option<usize>,
}

impl RagPipelineBuilder {
    #[must_use]
    pub fn chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Default result count for queries that do not specify one.
    #[must_use]
    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = Some(top_k);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if the chunker, embedder, store, or generator is missing.
    pub fn build(self) -> RagPipeline {
        self.try_build()
            .expect("RagPipelineBuilder requires chunker, embedder, store, and generator")
    }

    /// Builds the pipeline, returning `None` when a component is missing.
    pub fn try_build(self) -> Option<RagPipeline> {
        Some(RagPipeline {
            chunker: self.chunker?,
            embedder: self.embedder?,
            store: self.store?,
            generator: self.generator?,
            extractor: DocumentExtractor,
            http: reqwest::Client::new(),
            default_top_k: self.default_top_k.unwrap_or(5),
        })
    }
}

fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHAR_LIMIT).collect();
    if text.chars().count() > PREVIEW_CHAR_LIMIT {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_all_components() {
        assert!(RagPipelineBuilder::default().try_build().is_none());
    }

    #[test]
    fn preview_truncates_long_text() {
        let short = "short text";
        assert_eq!(preview(short), short);

        let long = "x".repeat(250);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 203);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let long: String = "ü".repeat(201);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 203);
    }

    #[test]
    fn scores_round_to_four_decimals() {
        assert_eq!(round_score(0.123456), 0.1235);
        assert_eq!(round_score(1.0), 1.0);
        assert_eq!(round_score(-0.00004), -0.0);
    }
}
