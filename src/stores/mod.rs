//! Vector storage for retrieval.
//!
//! A single [`VectorStore`] trait abstracts over index backends so the
//! pipeline never special-cases which one is active:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │   (async CRUD)   │
//!                  └────────┬─────────┘
//!                           │
//!              ┌────────────┼────────────┐
//!              ▼            ▼            ▼
//!       ┌────────────┐ ┌──────────┐ ┌──────────┐
//!       │ FlatVector │ │ (future) │ │ (future) │
//!       │   Store    │ │ pgvector │ │  managed │
//!       └────────────┘ └──────────┘ └──────────┘
//! ```
//!
//! The shipped backend is [`flat::FlatVectorStore`]: an exact
//! nearest-neighbor scan over normalized embeddings with save-on-every-write
//! persistence. Deployments pick one backend at construction time.

pub mod flat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use flat::FlatVectorStore;

/// A chunk as owned by the vector store, one per indexed [`TextChunk`].
///
/// [`TextChunk`]: crate::chunking::TextChunk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Globally unique key: `"{origin_id}_{sequence_index}"`.
    pub chunk_key: String,
    /// Stable id of the source document.
    pub origin_id: String,
    /// Human-readable source name (filename, URL).
    pub origin_name: String,
    /// The chunk text.
    pub text: String,
    /// Zero-based position of this chunk within its origin.
    pub sequence_index: usize,
}

impl StoredChunk {
    pub fn new(
        origin_id: impl Into<String>,
        origin_name: impl Into<String>,
        text: impl Into<String>,
        sequence_index: usize,
    ) -> Self {
        let origin_id = origin_id.into();
        Self {
            chunk_key: format!("{origin_id}_{sequence_index}"),
            origin_id,
            origin_name: origin_name.into(),
            text: text.into(),
            sequence_index,
        }
    }
}

/// One search hit: a stored chunk and its cosine similarity to the query.
///
/// Scores live in `[-1, 1]` up to floating-point drift; callers asserting
/// equality against 1.0 must tolerate a small epsilon.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Unified interface over vector index backends.
///
/// Mutations (`insert`, `delete_by_origin`, `clear`) are serialized relative
/// to each other and to `search`; every mutation durably persists the full
/// index state before returning.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Appends chunk/vector pairs. Requires one vector per chunk, each of the
    /// store's fixed dimension; empty batches are a no-op.
    async fn insert(
        &self,
        chunks: Vec<StoredChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), RagError>;

    /// Exact top-k cosine search, descending by score, ties broken by
    /// earliest insertion. An empty index yields an empty result set.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>, RagError>;

    /// Removes every chunk of the given origin, rebuilding the index from the
    /// survivors. Returns the number of chunks removed.
    async fn delete_by_origin(&self, origin_id: &str) -> Result<usize, RagError>;

    /// Current entry count.
    async fn count(&self) -> Result<usize, RagError>;

    /// Resets to an empty index of the same dimension.
    async fn clear(&self) -> Result<(), RagError>;
}
