//! Vector retriever. The backing client is `qdrant-client`, not ChromaDB, but
//! the source tag literal `"chromadb.<collection>"` is preserved verbatim --
//! it is a wire-visible, test-asserted constant (§8 scenarios (b) and (f) in
//! the originating specification).

use std::sync::Arc;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::CoreResult;
use crate::stores::VectorStore;
use memoria_models::{Filter, ResultType, RetrievalResult};

use super::apply_filters_in_process;

pub const DEFAULT_COLLECTION: &str = "chunks";

pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    similarity_floor: f64,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, collection: impl Into<String>, similarity_floor: f64) -> Self {
        Self { store, embedder, collection: collection.into(), similarity_floor }
    }

    fn source_tag(&self) -> String {
        format!("chromadb.{}", self.collection)
    }

    #[tracing::instrument(skip(self, filters), fields(collection = %self.collection))]
    pub async fn search(
        &self,
        query: &str,
        filters: &[Filter],
        limit: usize,
        user_id: Option<Uuid>,
    ) -> CoreResult<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.search(&embedding, user_id, limit).await?;

        let source = self.source_tag();
        let results: Vec<RetrievalResult> = hits
            .into_iter()
            .filter(|(_, score)| *score >= self.similarity_floor)
            .map(|(chunk, score)| {
                let metadata = serde_json::json!({
                    "recording_id": chunk.recording_id,
                    "start": chunk.start,
                    "end": chunk.end,
                    "language": chunk.language,
                    "tags": chunk.tags,
                    "category": chunk.category,
                    "created_at": chunk.created_at,
                    "entity_count": chunk.entity_count,
                });
                let mut result = RetrievalResult::new(chunk.id.to_string(), ResultType::Chunk, chunk.content, source.clone());
                result.metadata = metadata;
                result.score = score;
                result.timestamp = Some(chunk.created_at);
                result
            })
            .collect();

        let mut results = apply_filters_in_process(results, filters);
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    pub async fn get_by_id(&self, chunk_id: Uuid) -> CoreResult<Option<RetrievalResult>> {
        let record = self.store.get_by_id(chunk_id).await?;
        Ok(record.map(|r| {
            let mut result = RetrievalResult::new(r.chunk.id.to_string(), ResultType::Chunk, r.chunk.content, self.source_tag());
            result.score = 1.0;
            result.timestamp = Some(r.chunk.created_at);
            result
        }))
    }

    pub async fn health_check(&self) -> CoreResult<()> {
        self.store.health_check().await
    }
}
