//! Retrieval-augmented generation pipeline: token-aware chunking, exact
//! vector search with crash-safe persistence, and grounded answer
//! generation behind a soft-fail orchestrator.
//!
//! Data flow:
//!
//! ```text
//!   document text
//!        |
//!   [extract]  format detection, HTML stripping, remote fetch
//!        |
//!   [chunking]  normalize -> paragraph packing -> overlap / fallbacks
//!        |
//!   [embeddings]  batch embed (one provider call per document)
//!        |
//!   [stores]  flat exact index, cosine over normalized vectors,
//!        |    persisted to index.bin + metadata.json
//!        |
//!   [pipeline]  ingest / answer orchestration, soft-fail outcomes
//!        |
//!   [generation]  context assembly + Gemini generateContent
//! ```
//!
//! The pipeline boundary never propagates errors: [`RagPipeline::ingest`]
//! and [`RagPipeline::answer`] return structured outcomes describing what
//! happened. Components behind the boundary use [`RagError`] and `?`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lumina_rag::{
//!     HeuristicTokenCounter, MockAnswerGenerator, MockEmbeddingProvider,
//!     RagConfig, RagPipeline, TextChunker, stores::FlatVectorStore,
//! };
//!
//! # async fn demo() -> Result<(), lumina_rag::RagError> {
//! let config = RagConfig::default();
//! let store = FlatVectorStore::open(&config.index_dir(), config.embedding_dimension)?;
//! let pipeline = RagPipeline::builder()
//!     .chunker(TextChunker::new(
//!         config.chunk_size,
//!         config.chunk_overlap,
//!         Arc::new(HeuristicTokenCounter),
//!     ))
//!     .embedder(Arc::new(MockEmbeddingProvider::new()))
//!     .store(Arc::new(store))
//!     .generator(Arc::new(MockAnswerGenerator::new()))
//!     .default_top_k(config.top_k)
//!     .build();
//!
//! let outcome = pipeline.ingest_named("notes.txt", "some document text").await;
//! println!("{}: {} chunks", outcome.origin_name, outcome.chunk_count);
//!
//! let reply = pipeline.answer("what do the notes say?", None, None).await;
//! println!("{}", reply.answer);
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod generation;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use chunking::{HeuristicTokenCounter, TextChunk, TextChunker, TokenCounter};
#[cfg(feature = "tiktoken-counter")]
pub use chunking::TiktokenCounter;
pub use config::RagConfig;
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use extract::{DocumentExtractor, SourceKind};
pub use generation::{AnswerGenerator, GeminiGenerator, MockAnswerGenerator};
pub use pipeline::{
    IngestOutcome, IngestStatus, QueryOutcome, RagPipeline, RagPipelineBuilder, SourceRef,
};
pub use stores::{FlatVectorStore, SearchResult, StoredChunk, VectorStore};
pub use types::RagError;
