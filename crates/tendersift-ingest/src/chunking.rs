//! Overlapping chunker for the retrieval index.
//!
//! Chunks aim for `chunk_size` bytes and share `chunk_overlap` bytes with
//! their predecessor. A chunk prefers to end at a blank line in its last
//! 40%, else at a line break in its last 300 bytes.

/// Smallest chunk size honoured.
pub const MIN_CHUNK_SIZE: usize = 500;
/// Default chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 3500;
/// Default overlap between chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 400;

/// A chunk with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

pub struct OverlapChunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl OverlapChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let n = text.len();
        let mut start = 0usize;

        while start < n {
            let mut end = floor_boundary(text, (start + self.chunk_size).min(n));
            if end <= start {
                end = ceil_boundary(text, start + 1);
            }
            if end < n {
                end = self.break_point(text, start, end);
            }

            let piece = text[start..end].trim();
            if !piece.is_empty() {
                chunks.push(TextChunk {
                    text: piece.to_string(),
                    chunk_index: chunks.len(),
                    start_char: start,
                    end_char: end,
                });
            }
            if end >= n {
                break;
            }

            let next = floor_boundary(text, end.saturating_sub(self.chunk_overlap));
            start = if next > start { next } else { end };
        }
        chunks
    }

    fn break_point(&self, text: &str, start: usize, end: usize) -> usize {
        let window = &text[start..end];
        let blank_floor = self.chunk_size * 6 / 10;
        if let Some(idx) = window.rfind("\n\n") {
            if idx > blank_floor {
                return start + idx;
            }
        }
        let line_floor = self.chunk_size.saturating_sub(300);
        if let Some(idx) = window.rfind('\n') {
            if idx > line_floor {
                return start + idx;
            }
        }
        end
    }
}

impl Default for OverlapChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

/// Chunk texts only, for handing to a retriever.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    OverlapChunker::new(chunk_size, chunk_overlap)
        .chunk(text)
        .into_iter()
        .map(|c| c.text)
        .collect()
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
