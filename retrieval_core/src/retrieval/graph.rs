//! Graph retriever. Backing store is Neo4j through `neo4rs`, matching the
//! host repository's `graph_rag` crate; an in-process `petgraph`-backed fake
//! implements the same `GraphStore` trait for tests.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::stores::GraphStore;
use memoria_models::{normalize_entity_text, Filter, ResultType, RetrievalResult};

use super::apply_filters_in_process;

pub const DEFAULT_MAX_PATH_DEPTH: usize = 2;
pub const HARD_CAP_PATH_DEPTH: usize = 5;

pub struct GraphRetriever {
    store: Arc<dyn GraphStore>,
}

impl GraphRetriever {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Strategy 1: entities whose surface/normalized form contains the query,
    /// scored by `min(1, entity_frequency/10 + entity_count/20)` with a +0.3
    /// boost when the matched entity's form equals the query exactly.
    async fn entity_name_strategy(&self, query: &str, user_id: Uuid, limit: usize) -> CoreResult<Vec<RetrievalResult>> {
        let entities = self.store.find_entities_matching(query, user_id).await?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let normalized_query = normalize_entity_text(query);
        let entity_ids: Vec<Uuid> = entities.iter().map(|e| e.entity_id).collect();
        let chunks = self.store.chunks_mentioning(&entity_ids, user_id).await?;

        let mut results = Vec::new();
        for (chunk, edges) in chunks {
            let matched_entities: Vec<_> = entities
                .iter()
                .filter(|e| edges.iter().any(|m| m.entity_id == e.entity_id))
                .collect();
            if matched_entities.is_empty() {
                continue;
            }

            let entity_frequency: u64 = matched_entities.iter().map(|e| e.mention_count).sum();
            let mut score = (entity_frequency as f64 / 10.0 + chunk.entity_count as f64 / 20.0).min(1.0);
            if matched_entities.iter().any(|e| e.normalized_form == normalized_query) {
                score = (score + 0.3).min(1.0);
            }

            let mut result = RetrievalResult::new(chunk.id.to_string(), ResultType::Chunk, chunk.content.clone(), "neo4j.entity_mentions");
            result.score = score;
            result.timestamp = Some(chunk.created_at);
            result.metadata = serde_json::json!({
                "recording_id": chunk.recording_id,
                "mention_count": entity_frequency,
                "chunk_entity_count": chunk.entity_count,
            });
            result.entities = matched_entities.into_iter().cloned().collect();
            results.push(result);

            if results.len() >= limit {
                break;
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    /// Strategy 2: chunks whose text contains the query, score decaying with
    /// the position of the first match, floor 0.2.
    async fn text_content_strategy(&self, query: &str, user_id: Uuid, limit: usize) -> CoreResult<Vec<RetrievalResult>> {
        let needle = query.to_lowercase();
        let chunks = self.store.all_chunks(user_id).await?;

        let mut results: Vec<RetrievalResult> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let haystack = chunk.content.to_lowercase();
                let position = haystack.find(&needle)?;
                let decay = if haystack.is_empty() {
                    0.2
                } else {
                    (1.0 - (position as f64 / haystack.len() as f64)).max(0.2)
                };
                let mut result = RetrievalResult::new(chunk.id.to_string(), ResultType::Chunk, chunk.content.clone(), "neo4j.text_content");
                result.score = decay;
                result.timestamp = Some(chunk.created_at);
                result.metadata = serde_json::json!({
                    "recording_id": chunk.recording_id,
                    "match_position": position,
                });
                Some(result)
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    /// Strategy 3: chunks connected by a bounded-depth entity-to-entity path,
    /// score `1/(path_length+1)`, floor 0.2.
    async fn relationship_path_strategy(&self, query: &str, user_id: Uuid, limit: usize) -> CoreResult<Vec<RetrievalResult>> {
        let entities = self.store.find_entities_matching(query, user_id).await?;
        if entities.len() < 2 {
            return Ok(Vec::new());
        }

        let paths = self
            .store
            .chunk_paths_between_entities(entities[0].entity_id, entities[1].entity_id, DEFAULT_MAX_PATH_DEPTH, user_id)
            .await?;

        let mut results = Vec::new();
        for (chunks, path_length) in paths {
            let score = (1.0 / (path_length as f64 + 1.0)).max(0.2);
            for chunk in chunks {
                let mut result = RetrievalResult::new(chunk.id.to_string(), ResultType::Chunk, chunk.content.clone(), "neo4j.relationship_paths");
                result.score = score;
                result.timestamp = Some(chunk.created_at);
                result.metadata = serde_json::json!({ "path_length": path_length });
                results.push(result);
                if results.len() >= limit {
                    return Ok(results);
                }
            }
        }
        Ok(results)
    }

    #[tracing::instrument(skip(self, filters))]
    pub async fn search(&self, query: &str, filters: &[Filter], limit: usize, user_id: Uuid) -> CoreResult<Vec<RetrievalResult>> {
        let mut results = self.entity_name_strategy(query, user_id, limit).await?;

        if results.len() < limit {
            let remaining = limit - results.len();
            results.extend(self.text_content_strategy(query, user_id, remaining).await?);
        }

        if results.len() < limit {
            let remaining = limit - results.len();
            results.extend(self.relationship_path_strategy(query, user_id, remaining).await?);
        }

        results.truncate(limit);
        Ok(apply_filters_in_process(results, filters))
    }

    pub async fn find_entity_mentions(&self, name: &str, user_id: Uuid, limit: usize) -> CoreResult<Vec<RetrievalResult>> {
        self.entity_name_strategy(name, user_id, limit).await
    }

    /// Paths between two named entities up to `max_depth` (default 2, hard cap 5).
    /// Depth-bounded connection results are additionally tagged
    /// `neo4j.connections.depth_<N>`.
    pub async fn find_paths_between_entities(
        &self,
        name_a: &str,
        name_b: &str,
        max_depth: Option<usize>,
        user_id: Uuid,
    ) -> CoreResult<Vec<RetrievalResult>> {
        let depth = max_depth.unwrap_or(DEFAULT_MAX_PATH_DEPTH).min(HARD_CAP_PATH_DEPTH);

        let entities_a = self.store.find_entities_matching(name_a, user_id).await?;
        let entities_b = self.store.find_entities_matching(name_b, user_id).await?;
        let (Some(a), Some(b)) = (entities_a.first(), entities_b.first()) else {
            return Ok(Vec::new());
        };

        let paths = self.store.chunk_paths_between_entities(a.entity_id, b.entity_id, depth, user_id).await?;

        let mut results = Vec::new();
        for (chunks, path_length) in paths {
            let score = (1.0 / (path_length as f64 + 1.0)).max(0.2);
            for chunk in chunks {
                let mut result = RetrievalResult::new(
                    chunk.id.to_string(),
                    ResultType::Chunk,
                    chunk.content.clone(),
                    format!("neo4j.connections.depth_{path_length}"),
                );
                result.score = score;
                result.timestamp = Some(chunk.created_at);
                result.metadata = serde_json::json!({ "path_length": path_length });
                results.push(result);
            }
        }
        Ok(results)
    }

    pub async fn get_by_id(&self, chunk_id: Uuid) -> CoreResult<Option<RetrievalResult>> {
        let chunk = self.store.get_chunk(chunk_id).await?;
        Ok(chunk.map(|c| {
            let mut result = RetrievalResult::new(c.id.to_string(), ResultType::Chunk, c.content, "neo4j.entity_mentions");
            result.score = 1.0;
            result.timestamp = Some(c.created_at);
            result
        }))
    }

    pub async fn health_check(&self) -> CoreResult<()> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryGraphStore;
    use chrono::Utc;
    use memoria_models::{Chunk, Entity, EntityType, MentionsEdge};

    async fn seeded_store() -> (InMemoryGraphStore, Uuid, Chunk, Entity) {
        let store = InMemoryGraphStore::new();
        let recording_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let chunk = Chunk::new(recording_id, user_id, "Acme Corp announced a new product.".to_string(), 0, 35, 0, 1, "en".to_string());
        let mut entity = Entity::new("Acme Corp", EntityType::Organization, user_id, 0.9, Utc::now());
        entity.mention_count = 5;

        store.upsert_chunk(chunk.clone()).await.unwrap();
        store.upsert_entity(entity.clone()).await.unwrap();
        store
            .upsert_mention(MentionsEdge { chunk_id: chunk.id, entity_id: entity.entity_id, start: 0, end: 9, confidence: 0.9 })
            .await
            .unwrap();

        (store, user_id, chunk, entity)
    }

    #[tokio::test]
    async fn entity_name_search_tags_entity_mentions() {
        let (store, user_id, _, _) = seeded_store().await;
        let retriever = GraphRetriever::new(Arc::new(store));
        let results = retriever.search("Acme", &[], 10, user_id).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].source, "neo4j.entity_mentions");
    }

    #[tokio::test]
    async fn text_content_search_finds_substring_match() {
        let (store, user_id, _, _) = seeded_store().await;
        let retriever = GraphRetriever::new(Arc::new(store));
        let results = retriever.search("new product", &[], 10, user_id).await.unwrap();
        assert!(results.iter().any(|r| r.source == "neo4j.entity_mentions" || r.source == "neo4j.text_content"));
    }

    #[tokio::test]
    async fn no_match_returns_empty() {
        let (store, user_id, _, _) = seeded_store().await;
        let retriever = GraphRetriever::new(Arc::new(store));
        let results = retriever.search("nonexistent needle", &[], 10, user_id).await.unwrap();
        assert!(results.is_empty());
    }
}
