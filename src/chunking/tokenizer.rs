//! Token counting backends for the chunker.

#[cfg(feature = "tiktoken-counter")]
use crate::types::RagError;

/// Deterministic token counter consumed by [`TextChunker`](super::TextChunker).
///
/// Counts must be non-negative and monotonically non-decreasing under
/// concatenation of non-overlapping text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// BPE-accurate counter backed by the `cl100k_base` encoding.
#[cfg(feature = "tiktoken-counter")]
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken-counter")]
impl TiktokenCounter {
    pub fn new() -> Result<Self, RagError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|err| RagError::Tokenizer(err.to_string()))?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken-counter")]
impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Whitespace word count. Used in tests and when the BPE feature is off.
///
/// Coarser than BPE but satisfies the same monotonicity contract, which is
/// all the chunker relies on.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_counts_words() {
        let counter = HeuristicTokenCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("   "), 0);
        assert_eq!(counter.count("one two  three"), 3);
    }

    #[test]
    fn heuristic_is_monotonic_under_concatenation() {
        let counter = HeuristicTokenCounter;
        let a = "alpha beta";
        let b = "gamma delta epsilon";
        let joined = format!("{a} {b}");
        assert!(counter.count(&joined) >= counter.count(a));
        assert!(counter.count(&joined) >= counter.count(b));
    }

    #[cfg(feature = "tiktoken-counter")]
    #[test]
    fn tiktoken_counter_counts_tokens() {
        let counter = TiktokenCounter::new().unwrap();
        assert_eq!(counter.count(""), 0);
        assert!(counter.count("hello world") >= 2);
    }
}
