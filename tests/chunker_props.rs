//! Property tests for the chunker's structural guarantees.

use std::sync::Arc;

use proptest::prelude::*;

use lumina_rag::{HeuristicTokenCounter, TextChunker, TokenCounter};

/// Builds a document of `paragraph_sizes.len()` paragraphs where every word
/// is unique, so coverage and ordering can be checked by label.
fn document(paragraph_sizes: &[usize]) -> String {
    let mut next = 0usize;
    paragraph_sizes
        .iter()
        .map(|&size| {
            (0..size)
                .map(|_| {
                    let word = format!("w{next}");
                    next += 1;
                    word
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn input_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

proptest! {
    #[test]
    fn every_input_word_survives_in_order(
        paragraph_sizes in prop::collection::vec(1usize..25, 1..8),
        chunk_size in 3usize..20,
        chunk_overlap in 0usize..3,
    ) {
        let text = document(&paragraph_sizes);
        let chunker = TextChunker::new(chunk_size, chunk_overlap, Arc::new(HeuristicTokenCounter));
        let chunks = chunker.chunk(&text).unwrap();
        prop_assert!(!chunks.is_empty());

        // Scanning chunk words and skipping overlap repeats must reproduce
        // the input word sequence exactly.
        let expected = input_words(&text);
        let mut seen = 0usize;
        for chunk in &chunks {
            for word in chunk.text.split_whitespace() {
                if seen > 0 && expected[..seen].contains(&word) {
                    continue;
                }
                prop_assert!(seen < expected.len(), "extra word {word:?}");
                prop_assert_eq!(word, expected[seen]);
                seen += 1;
            }
        }
        prop_assert_eq!(seen, expected.len(), "words lost during chunking");
    }

    #[test]
    fn chunks_stay_within_budget_plus_overlap(
        paragraph_sizes in prop::collection::vec(1usize..40, 1..6),
        chunk_size in 3usize..20,
        chunk_overlap in 0usize..3,
    ) {
        let text = document(&paragraph_sizes);
        let chunker = TextChunker::new(chunk_size, chunk_overlap, Arc::new(HeuristicTokenCounter));
        let chunks = chunker.chunk(&text).unwrap();

        // An overlap seed may push a chunk past the budget, but never by
        // more than the overlap itself (every word counts as one token).
        for chunk in &chunks {
            prop_assert!(
                chunk.token_count <= chunk_size + chunk_overlap,
                "chunk of {} tokens exceeds {} + {}",
                chunk.token_count, chunk_size, chunk_overlap
            );
            prop_assert!(chunk.token_count > 0);
        }
    }

    #[test]
    fn metadata_is_consistent(
        paragraph_sizes in prop::collection::vec(1usize..25, 1..6),
        chunk_size in 3usize..20,
        chunk_overlap in 0usize..3,
    ) {
        let text = document(&paragraph_sizes);
        let chunker = TextChunker::new(chunk_size, chunk_overlap, Arc::new(HeuristicTokenCounter));
        let chunks = chunker.chunk(&text).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.sequence_index, i);
            prop_assert_eq!(chunk.token_count, HeuristicTokenCounter.count(&chunk.text));
            prop_assert_eq!(
                chunk.end_offset - chunk.start_offset,
                chunk.text.chars().count()
            );
            prop_assert!(!chunk.text.trim().is_empty());
        }
        for pair in chunks.windows(2) {
            prop_assert!(pair[1].start_offset >= pair[0].start_offset);
        }
    }
}
