//! Overlapping, boundary-aware text chunker.
//!
//! Splits a [`Document`]'s text into [`Chunk`]s of at most `chunk_size`
//! bytes, with consecutive chunks overlapping by `overlap` bytes. Splits
//! prefer paragraph boundaries (`\n\n`), then sentence boundaries, then
//! whitespace, falling back to a hard cut at a `char` boundary.
//!
//! Chunking is deterministic: the same document and parameters always
//! produce identical chunk boundaries.

use crate::models::{Chunk, Document};

/// Sentence-ending separators, tried after paragraph breaks.
const SENTENCE_SEPARATORS: &[&str] = &[". ", "! ", "? ", "\n"];

/// Split a document into ordered, overlapping chunks.
///
/// `overlap` must be smaller than `chunk_size` (enforced at config load);
/// otherwise chunking could never progress. Whitespace-only documents
/// produce no chunks.
pub fn chunk_document(document: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    debug_assert!(overlap < chunk_size);

    let text = &document.text;
    if text.trim().is_empty() {
        return Vec::new();
    }

    let len = text.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let mut window_end = floor_char_boundary(text, (start + chunk_size).min(len));
        if window_end <= start {
            // chunk_size smaller than one multi-byte char; take that char whole
            window_end = ceil_char_boundary(text, start + 1);
        }

        let end = if window_end >= len {
            len
        } else {
            split_point(text, start, window_end, overlap)
        };

        chunks.push(Chunk {
            id: Chunk::make_id(&document.id, index),
            document_id: document.id.clone(),
            index,
            text: text[start..end].to_string(),
            start_offset: start,
            end_offset: end,
        });

        if end >= len {
            break;
        }

        index += 1;
        let mut next_start = floor_char_boundary(text, end.saturating_sub(overlap));
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }

    chunks
}

/// Choose where to end the chunk starting at `start`, given the hard window
/// limit `window_end`. Prefers the last paragraph break in the window, then
/// the last sentence break, then the last space; any candidate must leave a
/// chunk longer than `overlap` so the next start advances.
fn split_point(text: &str, start: usize, window_end: usize, overlap: usize) -> usize {
    let window = &text[start..window_end];

    if let Some(pos) = window.rfind("\n\n") {
        let end = pos + 2;
        if end > overlap {
            return start + end;
        }
    }

    let best_sentence = SENTENCE_SEPARATORS
        .iter()
        .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
        .max();
    if let Some(end) = best_sentence {
        if end > overlap {
            return start + end;
        }
    }

    if let Some(pos) = window.rfind(' ') {
        let end = pos + 1;
        if end > overlap {
            return start + end;
        }
    }

    // Hard cut at the window limit.
    window_end
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    i = i.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceInfo;
    use chrono::Utc;

    fn doc(text: &str) -> Document {
        Document {
            id: "doc1".to_string(),
            text: text.to_string(),
            source: SourceInfo {
                path: "doc1.txt".to_string(),
                title: "doc1.txt".to_string(),
                content_type: "text/plain".to_string(),
                modified_at: Utc::now(),
            },
        }
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_document(&doc("Hello, world!"), 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].id, "doc1#0");
        assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 13));
    }

    #[test]
    fn whitespace_only_text_yields_no_chunks() {
        assert!(chunk_document(&doc("   \n\n  "), 100, 10).is_empty());
        assert!(chunk_document(&doc(""), 100, 10).is_empty());
    }

    #[test]
    fn chunk_length_never_exceeds_chunk_size() {
        let text = "word ".repeat(500);
        let chunks = chunk_document(&doc(&text), 64, 16);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 64, "chunk too long: {}", chunk.text.len());
        }
    }

    #[test]
    fn adjacent_chunks_overlap_by_configured_amount() {
        // No spaces or sentence breaks: forces hard cuts, so the overlap
        // arithmetic is exact.
        let text = "a".repeat(300);
        let chunks = chunk_document(&doc(&text), 100, 20);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_offset, pair[0].end_offset - 20);
        }
    }

    #[test]
    fn split_prefers_sentence_boundary() {
        let text = "The sky is blue. Grass is green. Roses are red and violets too.";
        let chunks = chunk_document(&doc(text), 40, 4);
        assert!(chunks[0].text.ends_with(". "), "got {:?}", chunks[0].text);
    }

    #[test]
    fn split_prefers_paragraph_boundary() {
        let text = "First paragraph here.\n\nSecond paragraph follows with more text after it.";
        let chunks = chunk_document(&doc(text), 40, 4);
        assert!(chunks[0].text.ends_with("\n\n"), "got {:?}", chunks[0].text);
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma. Delta epsilon zeta! Eta theta iota?\n\nKappa lambda mu.";
        let a = chunk_document(&doc(text), 30, 6);
        let b = chunk_document(&doc(text), 30, 6);
        assert_eq!(a, b);
    }

    #[test]
    fn offsets_reconstruct_original_text() {
        let text = "The quick brown fox jumps over the lazy dog. \
                    Pack my box with five dozen liquor jugs. \
                    How vexingly quick daft zebras jump!";
        let chunks = chunk_document(&doc(text), 50, 10);
        assert!(chunks.len() > 1);

        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for chunk in &chunks {
            assert!(chunk.start_offset <= covered, "gap before chunk {}", chunk.index);
            let skip = covered - chunk.start_offset;
            rebuilt.push_str(&chunk.text[skip..]);
            covered = chunk.end_offset;
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld ünïcode ".repeat(20);
        let chunks = chunk_document(&doc(&text), 37, 7);
        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for chunk in &chunks {
            let skip = covered - chunk.start_offset;
            rebuilt.push_str(&chunk.text[skip..]);
            covered = chunk.end_offset;
        }
        assert_eq!(rebuilt, text);
    }
}
