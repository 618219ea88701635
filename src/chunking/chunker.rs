//! Greedy paragraph packing with sentence and word-level fallbacks.

use std::sync::Arc;

use regex::Regex;

use crate::chunking::tokenizer::TokenCounter;
use crate::types::RagError;

/// A bounded, ordered segment of a document's normalized text.
///
/// Offsets are character positions into the normalized (not raw) input and
/// cover the emitted span; consecutive chunks overlap by at most the
/// configured overlap budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub sequence_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub token_count: usize,
}

/// Splits text into embeddable chunks under a token budget.
///
/// Packing is greedy: paragraphs are joined into the current chunk while the
/// running token count stays within `chunk_size` (a paragraph that exactly
/// fits is packed, not overflowed). On overflow the chunk is closed and the
/// next one is seeded with an overlap suffix of at most `chunk_overlap`
/// tokens. A paragraph that alone exceeds the budget is re-packed at sentence
/// granularity; a sentence that still exceeds it is force-split at word
/// boundaries with no overlap between the forced pieces.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    counter: Arc<dyn TokenCounter>,
    horizontal_ws: Regex,
    excess_newlines: Regex,
    paragraph_split: Regex,
    sentence_end: Regex,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            counter,
            horizontal_ws: Regex::new(r"[^\S\n]+").expect("static regex"),
            excess_newlines: Regex::new(r"\n{3,}").expect("static regex"),
            paragraph_split: Regex::new(r"\n\s*\n").expect("static regex"),
            sentence_end: Regex::new(r"[.!?]+\s+").expect("static regex"),
        }
    }

    /// Token budget per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Token budget carried between consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `raw_text` into ordered chunks.
    ///
    /// Fails with [`RagError::EmptyInput`] when the normalized text has no
    /// non-whitespace content; callers treat that as "nothing to index".
    pub fn chunk(&self, raw_text: &str) -> Result<Vec<TextChunk>, RagError> {
        let text = self.normalize(raw_text);
        if text.is_empty() {
            return Err(RagError::EmptyInput);
        }

        let paragraphs: Vec<&str> = self
            .paragraph_split
            .split(&text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if paragraphs.is_empty() {
            return Err(RagError::EmptyInput);
        }

        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;
        let mut start_offset = 0usize;

        for paragraph in paragraphs {
            let paragraph_tokens = self.counter.count(paragraph);

            if paragraph_tokens > self.chunk_size {
                // Close whatever is pending, then re-pack this paragraph at
                // sentence granularity. No overlap is carried into the
                // sentence-level pieces.
                if !current.is_empty() {
                    let closed_len = char_len(&current);
                    self.emit(&mut chunks, std::mem::take(&mut current), start_offset);
                    start_offset += closed_len;
                    current_tokens = 0;
                }
                for piece in self.split_paragraph(paragraph) {
                    let piece_len = char_len(&piece);
                    self.emit(&mut chunks, piece, start_offset);
                    start_offset += piece_len;
                }
            } else if current_tokens + paragraph_tokens > self.chunk_size {
                // current is never empty here: an empty chunk plus a
                // paragraph within budget lands in the packing branch.
                let overlap = self.overlap_suffix(&current);
                let closed_len = char_len(&current);
                let overlap_len = char_len(&overlap);
                self.emit(&mut chunks, std::mem::take(&mut current), start_offset);
                start_offset += closed_len - overlap_len;
                current = if overlap.is_empty() {
                    paragraph.to_string()
                } else {
                    format!("{overlap}\n\n{paragraph}")
                };
                current_tokens = self.counter.count(&current);
            } else {
                if current.is_empty() {
                    current.push_str(paragraph);
                } else {
                    current.push_str("\n\n");
                    current.push_str(paragraph);
                }
                current_tokens = self.counter.count(&current);
            }
        }

        if !current.trim().is_empty() {
            self.emit(&mut chunks, current, start_offset);
        }

        Ok(chunks)
    }

    fn emit(&self, chunks: &mut Vec<TextChunk>, text: String, start_offset: usize) {
        let end_offset = start_offset + char_len(&text);
        let token_count = self.counter.count(&text);
        chunks.push(TextChunk {
            sequence_index: chunks.len(),
            text,
            start_offset,
            end_offset,
            token_count,
        });
    }

    /// Re-packs an oversized paragraph at sentence granularity.
    fn split_paragraph(&self, paragraph: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;

        for sentence in self.split_sentences(paragraph) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let sentence_tokens = self.counter.count(sentence);

            if sentence_tokens > self.chunk_size {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                    current_tokens = 0;
                }
                pieces.extend(self.force_split(sentence));
            } else if current_tokens + sentence_tokens > self.chunk_size && !current.is_empty() {
                let overlap = self.overlap_suffix(&current);
                pieces.push(std::mem::take(&mut current));
                current = if overlap.is_empty() {
                    sentence.to_string()
                } else {
                    format!("{overlap} {sentence}")
                };
                current_tokens = self.counter.count(&current);
            } else {
                if current.is_empty() {
                    current.push_str(sentence);
                } else {
                    current.push(' ');
                    current.push_str(sentence);
                }
                current_tokens = self.counter.count(&current);
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }

    /// Force-splits a sentence at word boundaries. The only path where a
    /// chunk may exceed the budget is a single word that alone does.
    fn force_split(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if self.counter.count(&candidate) > self.chunk_size {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                }
                current = word.to_string();
            } else {
                current = candidate;
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }

    /// Walks backward over the closed chunk's words, keeping as many as fit
    /// within the overlap budget, in original order.
    fn overlap_suffix(&self, text: &str) -> String {
        if self.chunk_overlap == 0 || text.is_empty() {
            return String::new();
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let mut kept: Vec<&str> = Vec::new();
        let mut tokens = 0usize;
        for word in words.iter().rev() {
            let word_tokens = self.counter.count(word);
            if tokens + word_tokens > self.chunk_overlap {
                break;
            }
            kept.push(word);
            tokens += word_tokens;
        }
        kept.reverse();
        kept.join(" ")
    }

    /// Splits on terminal punctuation followed by whitespace, keeping the
    /// punctuation with its sentence. The regex crate has no lookbehind, so
    /// the boundary is computed from the match span instead.
    fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut last = 0usize;
        for mat in self.sentence_end.find_iter(text) {
            let punctuation_len = mat.as_str().trim_end().len();
            let boundary = mat.start() + punctuation_len;
            sentences.push(&text[last..boundary]);
            last = mat.end();
        }
        if last < text.len() {
            sentences.push(&text[last..]);
        }
        sentences
    }

    /// Collapses horizontal whitespace runs to single spaces and 3+ newlines
    /// to one blank line, then trims both ends.
    fn normalize(&self, text: &str) -> String {
        let collapsed = self.horizontal_ws.replace_all(text, " ");
        let collapsed = self.excess_newlines.replace_all(&collapsed, "\n\n");
        collapsed.trim().to_string()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::tokenizer::HeuristicTokenCounter;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> TextChunker {
        TextChunker::new(chunk_size, chunk_overlap, Arc::new(HeuristicTokenCounter))
    }

    #[test]
    fn empty_input_is_rejected() {
        let chunker = chunker(10, 3);
        assert!(matches!(chunker.chunk(""), Err(RagError::EmptyInput)));
        assert!(matches!(
            chunker.chunk("  \n\n \t "),
            Err(RagError::EmptyInput)
        ));
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunker = chunker(10, 3);
        let chunks = chunker.chunk("just a few words here").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].text, "just a few words here");
        assert_eq!(chunks[0].token_count, 5);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, chunks[0].text.chars().count());
    }

    #[test]
    fn overflowing_paragraph_starts_new_chunk_with_overlap() {
        // Paragraph A has 6 tokens, B has 7; 6 + 7 > 10 so B overflows and
        // the second chunk is seeded with at most 3 tokens of A's tail.
        let chunker = chunker(10, 3);
        let text = "a1 a2 a3 a4 a5 a6\n\nb1 b2 b3 b4 b5 b6 b7";
        let chunks = chunker.chunk(text).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a1 a2 a3 a4 a5 a6");
        assert_eq!(chunks[1].text, "a4 a5 a6\n\nb1 b2 b3 b4 b5 b6 b7");
        assert_eq!(chunks[1].sequence_index, 1);
        // Overlap prefix stays within the overlap budget.
        assert_eq!(HeuristicTokenCounter.count("a4 a5 a6"), 3);
    }

    #[test]
    fn exactly_fitting_paragraph_is_packed() {
        let chunker = chunker(10, 3);
        let text = "a1 a2 a3 a4 a5\n\nb1 b2 b3 b4 b5";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a1 a2 a3 a4 a5\n\nb1 b2 b3 b4 b5");
        assert_eq!(chunks[0].token_count, 10);
    }

    #[test]
    fn zero_overlap_carries_nothing() {
        let chunker = chunker(5, 0);
        let text = "a1 a2 a3 a4\n\nb1 b2 b3 b4";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a1 a2 a3 a4");
        assert_eq!(chunks[1].text, "b1 b2 b3 b4");
    }

    #[test]
    fn zero_overlap_chunks_reassemble_normalized_text() {
        let chunker = chunker(4, 0);
        let text = "p1a p1b p1c\n\np2a p2b\n\np3a p3b p3c p3d\n\np4a";
        let chunks = chunker.chunk(text).unwrap();
        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn oversized_paragraph_splits_on_sentences() {
        let chunker = chunker(6, 2);
        let text = "w1 w2 w3 w4. x1 x2 x3 x4. y1 y2 y3.";
        let chunks = chunker.chunk(text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 6, "chunk over budget: {:?}", chunk);
        }
        assert_eq!(chunks[0].text, "w1 w2 w3 w4.");
    }

    #[test]
    fn oversized_sentence_is_force_split_at_words() {
        let chunker = chunker(3, 2);
        let text = "w1 w2 w3 w4 w5 w6 w7 w8";
        let chunks = chunker.chunk(text).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "w1 w2 w3");
        // Forced word splits carry no overlap.
        assert_eq!(chunks[1].text, "w4 w5 w6");
        assert_eq!(chunks[2].text, "w7 w8");
    }

    #[test]
    fn sequence_indices_are_dense_and_increasing() {
        let chunker = chunker(4, 1);
        let text = "a b c d\n\ne f g\n\nh i j k\n\nl m";
        let chunks = chunker.chunk(text).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
        }
    }

    #[test]
    fn token_count_matches_counter_on_emitted_text() {
        let chunker = chunker(8, 2);
        let text = "one two three four five six\n\nseven eight nine ten eleven";
        let chunks = chunker.chunk(text).unwrap();
        for chunk in chunks {
            assert_eq!(chunk.token_count, HeuristicTokenCounter.count(&chunk.text));
        }
    }

    #[test]
    fn offsets_track_normalized_consumption() {
        let chunker = chunker(4, 0);
        let text = "a b c d\n\ne f g h\n\ni j";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks[0].start_offset, 0);
        for chunk in &chunks {
            assert_eq!(
                chunk.end_offset - chunk.start_offset,
                chunk.text.chars().count()
            );
        }
        // Without overlap each chunk starts where the previous one ended.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset >= pair[0].start_offset);
        }
    }

    #[test]
    fn normalization_collapses_whitespace() {
        let chunker = chunker(50, 0);
        let text = "alpha\t\tbeta   gamma\n\n\n\n\ndelta";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks[0].text, "alpha beta gamma\n\ndelta");
    }

    #[test]
    fn overlap_suffix_respects_budget() {
        let chunker = chunker(10, 3);
        let suffix = chunker.overlap_suffix("w1 w2 w3 w4 w5 w6");
        assert_eq!(suffix, "w4 w5 w6");
        assert!(HeuristicTokenCounter.count(&suffix) <= 3);

        let none = chunker.overlap_suffix("");
        assert!(none.is_empty());
    }

    #[test]
    fn sentence_split_keeps_terminal_punctuation() {
        let chunker = chunker(10, 0);
        let sentences = chunker.split_sentences("First one. Second one! Third?");
        assert_eq!(sentences, vec!["First one.", "Second one!", "Third?"]);
    }
}
