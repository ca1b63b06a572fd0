//! Splits a transcript into overlapping, fixed-width chunks.
//!
//! Defaults (grounded in `original_source/backend/services/ingestion_pipeline.py`
//! and the host repository's own `chunker` service, which exposes window/overlap
//! as a profile setting rather than a constant): 1000-character windows with a
//! 100-character overlap.

use memoria_config::ChunkerConfig;
use memoria_models::Chunk;
use uuid::Uuid;

pub struct Chunker {
    window_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    pub fn new(window_chars: usize, overlap_chars: usize) -> Self {
        Self { window_chars, overlap_chars }
    }

    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self::new(config.window_chars, config.overlap_chars)
    }

    /// Split `text` into chunks covering every character of the input exactly
    /// once per non-overlapping region, with adjacent chunks overlapping by
    /// `overlap_chars` characters. Deterministic: the same input always
    /// produces the same chunks in the same order.
    pub fn chunk_transcript(&self, recording_id: Uuid, user_id: Uuid, text: &str, language: &str) -> Vec<Chunk> {
        let mut char_boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        char_boundaries.push(text.len());
        let total_chars = char_boundaries.len().saturating_sub(1);

        if total_chars == 0 {
            return Vec::new();
        }

        let step = self.window_chars.saturating_sub(self.overlap_chars).max(1);

        let mut starts = Vec::new();
        let mut cursor = 0usize;
        loop {
            starts.push(cursor);
            if cursor + self.window_chars >= total_chars {
                break;
            }
            cursor += step;
        }

        let chunk_total = starts.len();

        starts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, start_char)| {
                let end_char = (start_char + self.window_chars).min(total_chars);
                let start_byte = char_boundaries[start_char];
                let end_byte = char_boundaries[end_char];
                let content = text[start_byte..end_byte].to_string();

                Chunk::new(
                    recording_id,
                    user_id,
                    content,
                    start_byte,
                    end_byte,
                    chunk_index,
                    chunk_total,
                    language.to_string(),
                )
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(1000, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covers_every_char(chunks: &[Chunk], total_len: usize) -> bool {
        let mut covered = vec![false; total_len];
        for chunk in chunks {
            for i in chunk.start..chunk.end {
                covered[i] = true;
            }
        }
        covered.into_iter().all(|c| c)
    }

    #[test]
    fn short_text_produces_a_single_chunk() {
        let chunker = Chunker::new(1000, 100);
        let chunks = chunker.chunk_transcript(Uuid::new_v4(), Uuid::new_v4(), "hello world", "en");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_total, 1);
        assert_eq!(chunks[0].content, "hello world");
    }

    #[test]
    fn long_text_is_fully_covered_with_overlap() {
        let chunker = Chunker::new(50, 10);
        let text = "a".repeat(237);
        let chunks = chunker.chunk_transcript(Uuid::new_v4(), Uuid::new_v4(), &text, "en");
        assert!(chunks.len() > 1);
        assert!(covers_every_char(&chunks, text.len()));
        for w in chunks.windows(2) {
            assert_eq!(w[0].chunk_index + 1, w[1].chunk_index);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = Chunker::new(50, 10);
        let text = "the quick brown fox jumps over the lazy dog ".repeat(5);
        let recording_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let a = chunker.chunk_transcript(recording_id, user_id, &text, "en");
        let b = chunker.chunk_transcript(recording_id, user_id, &text, "en");
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.content, y.content);
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk_transcript(Uuid::new_v4(), Uuid::new_v4(), "", "en");
        assert!(chunks.is_empty());
    }
}
