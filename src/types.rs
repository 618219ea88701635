//! Shared error type for the retrieval pipeline.

use thiserror::Error;

/// Errors surfaced by chunking, storage, and orchestration.
///
/// Only a handful of these ever cross the pipeline boundary as `Err`:
/// [`RagPipeline::ingest`](crate::pipeline::RagPipeline::ingest) and
/// [`RagPipeline::answer`](crate::pipeline::RagPipeline::answer) convert every
/// failure into a structured outcome so that one bad document or query cannot
/// take down the service.
#[derive(Debug, Error)]
pub enum RagError {
    /// Input text had no non-whitespace content after normalization.
    #[error("no text content to process")]
    EmptyInput,

    /// A vector's shape violated the index's fixed dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The source document type is not recognized by any extractor.
    #[error("unsupported source type: {0}")]
    UnsupportedSource(String),

    /// Persisted index state could not be loaded. Recoverable: the store
    /// falls back to a fresh empty index.
    #[error("failed to load persisted index: {0}")]
    PersistenceLoad(String),

    /// Vector store read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding provider failure.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Tokenizer could not be constructed.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// The answer generator has no credentials configured.
    #[error("answer generator is not configured")]
    GeneratorUnconfigured,

    /// The answer generator call itself failed.
    #[error("answer generation failed: {0}")]
    Generation(String),

    /// Remote document download failure.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
