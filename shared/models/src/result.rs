//! The result shape returned by every retriever, and the merge rule used when
//! the same logical item is surfaced by more than one of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::relationship::EntityRelationship;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Chunk,
    Entity,
    Relationship,
    Document,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f64,
    /// Comma-joined list of sub-strategy tags that surfaced this item, e.g.
    /// "chromadb.chunks" or "chromadb.chunks,neo4j.entity_mentions" once merged.
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<EntityRelationship>,
    pub embeddings: Option<Vec<f32>>,
}

impl RetrievalResult {
    pub fn new(id: impl Into<String>, result_type: ResultType, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result_type,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            score: 0.0,
            source: source.into(),
            timestamp: Some(Utc::now()),
            entities: Vec::new(),
            relationships: Vec::new(),
            embeddings: None,
        }
    }

    /// Merge another result representing the same logical item into this one.
    /// `source` becomes the comma-joined list of distinct tags in first-seen
    /// order; `entities`/`relationships` are unioned by their own id rather
    /// than concatenated with duplicates; the higher score wins.
    pub fn merge_with(mut self, other: RetrievalResult) -> Self {
        let mut sources: Vec<&str> = self.source.split(',').collect();
        for tag in other.source.split(',') {
            if !sources.contains(&tag) {
                sources.push(tag);
            }
        }
        self.source = sources.join(",");

        if other.score > self.score {
            self.score = other.score;
        }

        for entity in other.entities {
            if !self.entities.iter().any(|e| e.entity_id == entity.entity_id) {
                self.entities.push(entity);
            }
        }

        for rel in other.relationships {
            let exists = self.relationships.iter().any(|r| {
                r.from_entity_id == rel.from_entity_id
                    && r.to_entity_id == rel.to_entity_id
                    && r.relation_type == rel.relation_type
            });
            if !exists {
                self.relationships.push(rel);
            }
        }

        if let (Some(map), Some(other_map)) = (self.metadata.as_object_mut(), other.metadata.as_object()) {
            for (k, v) in other_map {
                map.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        if self.embeddings.is_none() {
            self.embeddings = other.embeddings;
        }

        if self.result_type != other.result_type {
            self.result_type = ResultType::Mixed;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_joins_distinct_sources_in_order() {
        let a = RetrievalResult::new("1", ResultType::Chunk, "hello", "chromadb.chunks");
        let b = RetrievalResult::new("1", ResultType::Chunk, "hello", "neo4j.entity_mentions");
        let merged = a.merge_with(b);
        assert_eq!(merged.source, "chromadb.chunks,neo4j.entity_mentions");
    }

    #[test]
    fn merge_is_idempotent_on_source_tags() {
        let a = RetrievalResult::new("1", ResultType::Chunk, "hello", "chromadb.chunks");
        let b = RetrievalResult::new("1", ResultType::Chunk, "hello", "chromadb.chunks");
        let merged = a.merge_with(b);
        assert_eq!(merged.source, "chromadb.chunks");
    }

    #[test]
    fn merge_promotes_to_mixed_on_type_conflict() {
        let a = RetrievalResult::new("1", ResultType::Chunk, "hello", "chromadb.chunks");
        let b = RetrievalResult::new("1", ResultType::Entity, "hello", "neo4j.entity_mentions");
        let merged = a.merge_with(b);
        assert_eq!(merged.result_type, ResultType::Mixed);
    }
}
