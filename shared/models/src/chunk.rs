//! A chunk is an immutable substring of a transcript. It exists in two physical
//! places -- the vector store and the graph -- and the two representations must
//! share the same id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used to derive a chunk id deterministically from its parent
/// recording id and index, so re-ingestion never mints a second id for the
/// same logical chunk.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x65, 0x6d, 0x6f, 0x72, 0x69, 0x61, 0x2d, 0x63, 0x68, 0x75, 0x6e, 0x6b, 0x2d, 0x6e, 0x73,
]);

/// Derive a stable chunk id from its parent recording id and position.
pub fn derive_chunk_id(recording_id: Uuid, chunk_index: usize) -> Uuid {
    let name = format!("{recording_id}:{chunk_index}");
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub recording_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub start: usize,
    pub end: usize,
    pub chunk_index: usize,
    pub chunk_total: usize,
    pub language: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub entity_count: usize,
}

impl Chunk {
    pub fn new(
        recording_id: Uuid,
        user_id: Uuid,
        content: String,
        start: usize,
        end: usize,
        chunk_index: usize,
        chunk_total: usize,
        language: String,
    ) -> Self {
        Self {
            id: derive_chunk_id(recording_id, chunk_index),
            recording_id,
            user_id,
            content,
            start,
            end,
            chunk_index,
            chunk_total,
            language,
            tags: Vec::new(),
            category: None,
            created_at: Utc::now(),
            entity_count: 0,
        }
    }
}

/// Opaque handle the core treats as nothing more than an id and an owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let recording_id = Uuid::new_v4();
        let a = derive_chunk_id(recording_id, 3);
        let b = derive_chunk_id(recording_id, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_varies_by_index() {
        let recording_id = Uuid::new_v4();
        assert_ne!(derive_chunk_id(recording_id, 0), derive_chunk_id(recording_id, 1));
    }
}
