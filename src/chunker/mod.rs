
use tracing::debug;

use crate::{RagError, Result};

/// A slice of a larger document ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub word_count: usize,
}

/// Split normalised text into overlapping word windows.
///
/// Paragraphs (non-blank lines) are concatenated into a running word buffer;
/// every time the buffer reaches `max_words` a chunk is emitted and the buffer
/// advances, keeping `overlap_words` trailing words for the next window. Any
/// words left over after the final paragraph become one trailing chunk, which
/// may be shorter than `max_words`.
#[inline]
pub fn chunk_text(text: &str, max_words: usize, overlap_words: usize) -> Result<Vec<TextChunk>> {
    if max_words == 0 {
        return Err(RagError::InvalidParameter(
            "max_words must be > 0".to_string(),
        ));
    }

    let paragraphs = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let mut chunks = Vec::new();
    let mut carryover: Vec<&str> = Vec::new();

    for paragraph in paragraphs {
        carryover.extend(paragraph.split_whitespace());

        while carryover.len() >= max_words {
            chunks.push(make_chunk(&carryover[..max_words]));

            // The advance step must move at least one word forward, or an
            // overlap >= max_words would re-emit the same window forever.
            let advance = if overlap_words > 0 {
                max_words.saturating_sub(overlap_words).max(1)
            } else {
                max_words
            };
            carryover.drain(..advance);
        }
    }

    if !carryover.is_empty() {
        chunks.push(make_chunk(&carryover));
    }

    debug!(
        "Chunked {} words of input into {} chunks",
        text.split_whitespace().count(),
        chunks.len()
    );

    Ok(chunks)
}

fn make_chunk(words: &[&str]) -> TextChunk {
    TextChunk {
        content: words.join(" "),
        word_count: words.len(),
    }
}
