//! Store-agnostic seams for the vector index and the entity graph, plus the
//! narrow ingestion bookkeeping trait. Real backends (`qdrant-client`,
//! `neo4rs`) implement these traits; in-memory fakes back the test suite.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use memoria_models::{Chunk, Entity, EntityRelationship, FollowedByEdge, MentionsEdge};

/// A vector-store entry: a chunk plus its embedding.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: Vec<VectorRecord>) -> CoreResult<()>;
    async fn delete_by_recording(&self, recording_id: Uuid) -> CoreResult<()>;
    async fn get_by_id(&self, chunk_id: Uuid) -> CoreResult<Option<VectorRecord>>;
    /// Nearest-neighbor search against a query embedding. Returns (chunk, similarity) pairs,
    /// similarity computed as `max(0, 1 - distance)`.
    async fn search(&self, query_embedding: &[f32], user_id: Option<Uuid>, limit: usize) -> CoreResult<Vec<(Chunk, f64)>>;
    async fn health_check(&self) -> CoreResult<()>;
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_chunk(&self, chunk: Chunk) -> CoreResult<()>;
    async fn upsert_entity(&self, entity: Entity) -> CoreResult<()>;
    async fn upsert_mention(&self, edge: MentionsEdge) -> CoreResult<()>;
    /// Whether this exact `(chunk, entity, span)` mention has already been recorded.
    /// Used by the ingestion writer to decide whether re-ingesting the same chunk
    /// should advance an entity's `mention_count` again.
    async fn mention_exists(&self, chunk_id: Uuid, entity_id: Uuid, start: usize, end: usize) -> CoreResult<bool>;
    async fn upsert_followed_by(&self, edge: FollowedByEdge) -> CoreResult<()>;
    async fn upsert_entity_relationship(&self, rel: EntityRelationship) -> CoreResult<()>;
    async fn delete_by_recording(&self, recording_id: Uuid) -> CoreResult<()>;
    async fn get_chunk(&self, chunk_id: Uuid) -> CoreResult<Option<Chunk>>;
    async fn find_entity_by_normalized(&self, normalized_form: &str, user_id: Uuid) -> CoreResult<Option<Entity>>;
    /// Entities whose surface or normalized form contains `query` (case-insensitive).
    async fn find_entities_matching(&self, query: &str, user_id: Uuid) -> CoreResult<Vec<Entity>>;
    /// Chunks that mention any of the given entities, with the mention edges involved.
    async fn chunks_mentioning(&self, entity_ids: &[Uuid], user_id: Uuid) -> CoreResult<Vec<(Chunk, Vec<MentionsEdge>)>>;
    /// All chunks scoped to a user, for text-content search.
    async fn all_chunks(&self, user_id: Uuid) -> CoreResult<Vec<Chunk>>;
    /// Bounded-depth paths of chunks connected through shared/related entities.
    async fn chunk_paths_between_entities(
        &self,
        entity_a: Uuid,
        entity_b: Uuid,
        max_depth: usize,
        user_id: Uuid,
    ) -> CoreResult<Vec<(Vec<Chunk>, usize)>>;
    async fn health_check(&self) -> CoreResult<()>;
}

/// Per-recording ingestion bookkeeping. The core ships only the in-memory
/// implementation; a `sqlx`-backed Postgres implementation belongs to the
/// out-of-scope relational bookkeeping layer.
#[async_trait]
pub trait IngestionLedger: Send + Sync {
    async fn mark_started(&self, recording_id: Uuid) -> CoreResult<()>;
    async fn mark_committed(&self, recording_id: Uuid) -> CoreResult<()>;
    async fn mark_failed(&self, recording_id: Uuid, reason: String) -> CoreResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerStatus {
    Started,
    Committed,
    Failed(String),
}

/// In-memory vector store fake, keyed by chunk id.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: parking_lot::RwLock<HashMap<Uuid, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> CoreResult<()> {
        let mut store = self.records.write();
        for record in records {
            store.insert(record.chunk.id, record);
        }
        Ok(())
    }

    async fn delete_by_recording(&self, recording_id: Uuid) -> CoreResult<()> {
        self.records.write().retain(|_, r| r.chunk.recording_id != recording_id);
        Ok(())
    }

    async fn get_by_id(&self, chunk_id: Uuid) -> CoreResult<Option<VectorRecord>> {
        Ok(self.records.read().get(&chunk_id).cloned())
    }

    async fn search(&self, query_embedding: &[f32], user_id: Option<Uuid>, limit: usize) -> CoreResult<Vec<(Chunk, f64)>> {
        let store = self.records.read();
        let mut scored: Vec<(Chunk, f64)> = store
            .values()
            .filter(|r| user_id.map(|uid| r.chunk.user_id == uid).unwrap_or(true))
            .map(|r| (r.chunk.clone(), cosine_similarity(query_embedding, &r.embedding).max(0.0)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn health_check(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// In-memory graph store fake backed by a `petgraph` directed graph, sufficient
/// to exercise the three search strategies and path-bounding logic without a
/// live Neo4j instance.
pub struct InMemoryGraphStore {
    chunks: parking_lot::RwLock<HashMap<Uuid, Chunk>>,
    entities: parking_lot::RwLock<HashMap<Uuid, Entity>>,
    mentions: parking_lot::RwLock<Vec<MentionsEdge>>,
    followed_by: parking_lot::RwLock<Vec<FollowedByEdge>>,
    entity_relationships: parking_lot::RwLock<Vec<EntityRelationship>>,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self {
            chunks: parking_lot::RwLock::new(HashMap::new()),
            entities: parking_lot::RwLock::new(HashMap::new()),
            mentions: parking_lot::RwLock::new(Vec::new()),
            followed_by: parking_lot::RwLock::new(Vec::new()),
            entity_relationships: parking_lot::RwLock::new(Vec::new()),
        }
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded `FOLLOWED_BY` edges, for test introspection.
    pub fn followed_by_edges(&self) -> Vec<FollowedByEdge> {
        self.followed_by.read().clone()
    }

    /// All recorded entity-to-entity relationships, for test introspection.
    pub fn entity_relationships(&self) -> Vec<EntityRelationship> {
        self.entity_relationships.read().clone()
    }

    /// Build an undirected adjacency graph over entities connected by a shared
    /// chunk mention, as a basis for bounded-depth path search.
    fn entity_adjacency(&self) -> petgraph::graphmap::UnGraphMap<Uuid, ()> {
        let mut graph = petgraph::graphmap::UnGraphMap::new();
        let mentions = self.mentions.read();

        let mut by_chunk: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for m in mentions.iter() {
            by_chunk.entry(m.chunk_id).or_default().push(m.entity_id);
        }

        for entity_ids in by_chunk.values() {
            for e in entity_ids {
                graph.add_node(*e);
            }
            for i in 0..entity_ids.len() {
                for j in (i + 1)..entity_ids.len() {
                    graph.add_edge(entity_ids[i], entity_ids[j], ());
                }
            }
        }

        graph
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_chunk(&self, chunk: Chunk) -> CoreResult<()> {
        self.chunks.write().insert(chunk.id, chunk);
        Ok(())
    }

    async fn upsert_entity(&self, entity: Entity) -> CoreResult<()> {
        self.entities.write().insert(entity.entity_id, entity);
        Ok(())
    }

    async fn upsert_mention(&self, edge: MentionsEdge) -> CoreResult<()> {
        let mut mentions = self.mentions.write();
        if !mentions
            .iter()
            .any(|m| m.chunk_id == edge.chunk_id && m.entity_id == edge.entity_id && m.start == edge.start && m.end == edge.end)
        {
            mentions.push(edge);
        }
        Ok(())
    }

    async fn mention_exists(&self, chunk_id: Uuid, entity_id: Uuid, start: usize, end: usize) -> CoreResult<bool> {
        Ok(self
            .mentions
            .read()
            .iter()
            .any(|m| m.chunk_id == chunk_id && m.entity_id == entity_id && m.start == start && m.end == end))
    }

    async fn upsert_followed_by(&self, edge: FollowedByEdge) -> CoreResult<()> {
        let mut edges = self.followed_by.write();
        if !edges
            .iter()
            .any(|e| e.from_chunk_id == edge.from_chunk_id && e.to_chunk_id == edge.to_chunk_id)
        {
            edges.push(edge);
        }
        Ok(())
    }

    async fn upsert_entity_relationship(&self, rel: EntityRelationship) -> CoreResult<()> {
        let mut rels = self.entity_relationships.write();
        if let Some(existing) = rels
            .iter_mut()
            .find(|r| r.from_entity_id == rel.from_entity_id && r.to_entity_id == rel.to_entity_id && r.relation_type == rel.relation_type)
        {
            existing.bump_co_occurrence();
        } else {
            rels.push(rel);
        }
        Ok(())
    }

    async fn delete_by_recording(&self, recording_id: Uuid) -> CoreResult<()> {
        let removed_ids: Vec<Uuid> = {
            let chunks = self.chunks.read();
            chunks.values().filter(|c| c.recording_id == recording_id).map(|c| c.id).collect()
        };
        self.chunks.write().retain(|_, c| c.recording_id != recording_id);
        self.mentions.write().retain(|m| !removed_ids.contains(&m.chunk_id));
        self.followed_by
            .write()
            .retain(|e| !removed_ids.contains(&e.from_chunk_id) && !removed_ids.contains(&e.to_chunk_id));
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: Uuid) -> CoreResult<Option<Chunk>> {
        Ok(self.chunks.read().get(&chunk_id).cloned())
    }

    async fn find_entity_by_normalized(&self, normalized_form: &str, user_id: Uuid) -> CoreResult<Option<Entity>> {
        Ok(self
            .entities
            .read()
            .values()
            .find(|e| e.normalized_form == normalized_form && e.user_id == user_id)
            .cloned())
    }

    async fn find_entities_matching(&self, query: &str, user_id: Uuid) -> CoreResult<Vec<Entity>> {
        let needle = query.to_lowercase();
        Ok(self
            .entities
            .read()
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| e.surface_form.to_lowercase().contains(&needle) || e.normalized_form.contains(&needle))
            .cloned()
            .collect())
    }

    async fn chunks_mentioning(&self, entity_ids: &[Uuid], user_id: Uuid) -> CoreResult<Vec<(Chunk, Vec<MentionsEdge>)>> {
        let mentions = self.mentions.read();
        let chunks = self.chunks.read();

        let mut by_chunk: HashMap<Uuid, Vec<MentionsEdge>> = HashMap::new();
        for m in mentions.iter().filter(|m| entity_ids.contains(&m.entity_id)) {
            by_chunk.entry(m.chunk_id).or_default().push(m.clone());
        }

        Ok(by_chunk
            .into_iter()
            .filter_map(|(chunk_id, edges)| {
                chunks
                    .get(&chunk_id)
                    .filter(|c| c.user_id == user_id)
                    .map(|c| (c.clone(), edges))
            })
            .collect())
    }

    async fn all_chunks(&self, user_id: Uuid) -> CoreResult<Vec<Chunk>> {
        Ok(self.chunks.read().values().filter(|c| c.user_id == user_id).cloned().collect())
    }

    async fn chunk_paths_between_entities(
        &self,
        entity_a: Uuid,
        entity_b: Uuid,
        max_depth: usize,
        user_id: Uuid,
    ) -> CoreResult<Vec<(Vec<Chunk>, usize)>> {
        use petgraph::algo::astar;

        let graph = self.entity_adjacency();
        let path = astar(&graph, entity_a, |n| n == entity_b, |_| 1usize, |_| 0usize);

        let Some((cost, node_path)) = path else {
            return Ok(Vec::new());
        };
        if cost > max_depth {
            return Ok(Vec::new());
        }

        let chunks = self
            .chunks_mentioning(&node_path, user_id)
            .await?
            .into_iter()
            .map(|(c, _)| c)
            .collect::<Vec<_>>();

        if chunks.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![(chunks, cost)])
        }
    }

    async fn health_check(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// In-memory ingestion ledger, used in tests in place of the out-of-scope
/// Postgres-backed bookkeeping layer.
#[derive(Default)]
pub struct InMemoryIngestionLedger {
    statuses: parking_lot::RwLock<HashMap<Uuid, LedgerStatus>>,
}

impl InMemoryIngestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, recording_id: Uuid) -> Option<LedgerStatus> {
        self.statuses.read().get(&recording_id).cloned()
    }
}

#[async_trait]
impl IngestionLedger for InMemoryIngestionLedger {
    async fn mark_started(&self, recording_id: Uuid) -> CoreResult<()> {
        self.statuses.write().insert(recording_id, LedgerStatus::Started);
        Ok(())
    }

    async fn mark_committed(&self, recording_id: Uuid) -> CoreResult<()> {
        self.statuses.write().insert(recording_id, LedgerStatus::Committed);
        Ok(())
    }

    async fn mark_failed(&self, recording_id: Uuid, reason: String) -> CoreResult<()> {
        self.statuses.write().insert(recording_id, LedgerStatus::Failed(reason));
        Ok(())
    }
}

/// Wrap an arbitrary store error as an upstream `CoreError` tagged with the
/// originating store name.
pub fn upstream_error(store: &'static str, message: impl std::fmt::Display) -> CoreError {
    if store == "vector" {
        CoreError::upstream_vector(message.to_string())
    } else {
        CoreError::upstream_graph(message.to_string())
    }
}
