//! Token-aware text chunking.
//!
//! Splits normalized document text into ordered, size-bounded, overlapping
//! segments suitable for embedding. Paragraphs are packed greedily; oversized
//! paragraphs fall back to sentence packing, and oversized sentences are
//! force-split at word boundaries.

pub mod chunker;
pub mod tokenizer;

pub use chunker::{TextChunk, TextChunker};
pub use tokenizer::{HeuristicTokenCounter, TokenCounter};

#[cfg(feature = "tiktoken-counter")]
pub use tokenizer::TiktokenCounter;
