//! Dual-store writer. Turns a transcript into chunks, extracts entities per
//! chunk, and commits the result to both the vector store and the graph under
//! a "both or neither" contract keyed by recording id.
//!
//! Grounded in `original_source/backend/services/ingestion_pipeline.py`'s
//! commit/rollback shape and the host repository's `database` crate for the
//! ledger convention; there is no real distributed transaction, so the
//! "commit both or neither" property is achieved by keyed compensation (§9
//! of the originating specification).

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::embedding::Embedder;
use crate::entity::{EntityExtractor, ExtractedEntity};
use crate::error::CoreResult;
use crate::stores::{GraphStore, IngestionLedger, VectorRecord, VectorStore};
use memoria_config::ChunkerConfig;
use memoria_models::{derive_entity_id, normalize_entity_text, Chunk, Entity, EntityRelationship, EntityType, FollowedByEdge, MentionsEdge};
use memoria_observability::{log_ingestion_completed, OperationResult};

const SERVICE_NAME: &str = "retrieval_core";

#[derive(Debug, Clone, Copy)]
pub struct IngestionReport {
    pub recording_id: Uuid,
    pub chunks_written: usize,
    pub entities_written: usize,
}

pub struct IngestionWriter {
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    ledger: Arc<dyn IngestionLedger>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn EntityExtractor>,
    chunker_config: ChunkerConfig,
}

impl IngestionWriter {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        ledger: Arc<dyn IngestionLedger>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn EntityExtractor>,
        chunker_config: ChunkerConfig,
    ) -> Self {
        Self { vector_store, graph_store, ledger, embedder, extractor, chunker_config }
    }

    /// Delete everything keyed by `recording_id` from both stores. Best-effort:
    /// failures are logged, not propagated, since this already runs on a failure path.
    async fn compensate(&self, recording_id: Uuid, reason: &str) {
        if let Err(err) = self.graph_store.delete_by_recording(recording_id).await {
            tracing::error!(recording_id = %recording_id, error = %err, "rollback failed to clear graph entries");
        }
        if let Err(err) = self.vector_store.delete_by_recording(recording_id).await {
            tracing::error!(recording_id = %recording_id, error = %err, "rollback failed to clear vector entries");
        }
        if let Err(err) = self.ledger.mark_failed(recording_id, reason.to_string()).await {
            tracing::error!(recording_id = %recording_id, error = %err, "failed to record ledger failure status");
        }
    }

    /// For each chunk in order: upsert the chunk node, merge each extracted
    /// entity by `(normalized form, type, user)`, add its `MENTIONS` edge, and
    /// infer relationships over entity pairs co-mentioned in the chunk. Once
    /// every chunk node exists, write `FOLLOWED_BY` edges across the sequence.
    async fn write_graph(&self, chunks: &[Chunk], entities_per_chunk: &[Vec<ExtractedEntity>], user_id: Uuid) -> CoreResult<()> {
        for (chunk, extracted) in chunks.iter().zip(entities_per_chunk.iter()) {
            self.graph_store.upsert_chunk(chunk.clone()).await?;

            let mut resolved: Vec<(Uuid, EntityType, bool)> = Vec::with_capacity(extracted.len());
            for e in extracted {
                let normalized = normalize_entity_text(&e.surface_form);
                let entity_id = derive_entity_id(&normalized, e.entity_type, user_id);

                // Re-ingesting the same chunk must not advance mention_count a second
                // time; only a span not already recorded for this chunk counts as new.
                let already_mentioned = self.graph_store.mention_exists(chunk.id, entity_id, e.start, e.end).await?;

                match self.graph_store.find_entity_by_normalized(&normalized, user_id).await? {
                    Some(mut existing) => {
                        if !already_mentioned {
                            existing.merge_mention(e.confidence, chunk.created_at);
                            self.graph_store.upsert_entity(existing).await?;
                        }
                    }
                    None => {
                        let entity = Entity::new(&e.surface_form, e.entity_type, user_id, e.confidence, chunk.created_at);
                        self.graph_store.upsert_entity(entity).await?;
                    }
                }

                if !already_mentioned {
                    self.graph_store
                        .upsert_mention(MentionsEdge { chunk_id: chunk.id, entity_id, start: e.start, end: e.end, confidence: e.confidence })
                        .await?;
                }

                resolved.push((entity_id, e.entity_type, !already_mentioned));
            }

            // Only (re-)infer a pair's relationship when at least one side is a mention
            // new to this chunk, so re-ingesting an unchanged chunk leaves co-occurrence
            // counts untouched.
            for i in 0..resolved.len() {
                for j in (i + 1)..resolved.len() {
                    let (from_id, from_type, from_new) = resolved[i];
                    let (to_id, to_type, to_new) = resolved[j];
                    if from_id == to_id || !(from_new || to_new) {
                        continue;
                    }
                    let rel = EntityRelationship::new(from_id, to_id, from_type, to_type);
                    self.graph_store.upsert_entity_relationship(rel).await?;
                }
            }
        }

        for window in chunks.windows(2) {
            self.graph_store
                .upsert_followed_by(FollowedByEdge {
                    from_chunk_id: window[0].id,
                    to_chunk_id: window[1].id,
                    sequence_order: window[0].chunk_index,
                })
                .await?;
        }

        Ok(())
    }

    async fn write_vectors(&self, chunks: &[Chunk]) -> CoreResult<()> {
        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.content).await?;
            records.push(VectorRecord { chunk: chunk.clone(), embedding });
        }
        self.vector_store.upsert(records).await
    }

    /// Chunk a transcript, extract entities per chunk, and commit the batch to
    /// both stores. Re-running on the same `(recording_id, chunks)` input is
    /// safe: every node creation below is merge-keyed on a stable id.
    #[tracing::instrument(skip(self, transcript))]
    pub async fn ingest_recording(&self, recording_id: Uuid, user_id: Uuid, transcript: &str, language: &str) -> CoreResult<IngestionReport> {
        let started_at = Instant::now();
        self.ledger.mark_started(recording_id).await?;

        let chunker = Chunker::from_config(&self.chunker_config);
        let mut chunks = chunker.chunk_transcript(recording_id, user_id, transcript, language);

        let mut entities_per_chunk = Vec::with_capacity(chunks.len());
        for chunk in &mut chunks {
            let entities = self.extractor.extract(&chunk.content, language).await?;
            chunk.entity_count = entities.len();
            entities_per_chunk.push(entities);
        }

        let (graph_result, vector_result) = tokio::join!(
            self.write_graph(&chunks, &entities_per_chunk, user_id),
            self.write_vectors(&chunks),
        );

        let duration_ms = started_at.elapsed().as_millis() as u64;
        let recording_id_str = recording_id.to_string();

        match (graph_result, vector_result) {
            (Ok(()), Ok(())) => match self.ledger.mark_committed(recording_id).await {
                Ok(()) => {
                    let entities_written = entities_per_chunk.iter().map(|v| v.len()).sum();
                    log_ingestion_completed(SERVICE_NAME, &recording_id_str, chunks.len(), duration_ms, OperationResult::Success, None);
                    Ok(IngestionReport { recording_id, chunks_written: chunks.len(), entities_written })
                }
                Err(err) => {
                    tracing::error!(recording_id = %recording_id, error = %err, "bookkeeping commit failed after dual write, rolling back");
                    self.compensate(recording_id, &err.to_string()).await;
                    log_ingestion_completed(SERVICE_NAME, &recording_id_str, chunks.len(), duration_ms, OperationResult::Failure, Some(&err.to_string()));
                    Err(err)
                }
            },
            (Err(graph_err), Ok(())) => {
                tracing::warn!(recording_id = %recording_id, error = %graph_err, "graph write failed, rolling back vector entries");
                self.compensate(recording_id, &graph_err.to_string()).await;
                log_ingestion_completed(SERVICE_NAME, &recording_id_str, chunks.len(), duration_ms, OperationResult::Failure, Some(&graph_err.to_string()));
                Err(graph_err)
            }
            (Ok(()), Err(vector_err)) => {
                tracing::warn!(recording_id = %recording_id, error = %vector_err, "vector write failed, rolling back graph entries");
                self.compensate(recording_id, &vector_err.to_string()).await;
                log_ingestion_completed(SERVICE_NAME, &recording_id_str, chunks.len(), duration_ms, OperationResult::Failure, Some(&vector_err.to_string()));
                Err(vector_err)
            }
            (Err(graph_err), Err(vector_err)) => {
                tracing::error!(recording_id = %recording_id, graph_error = %graph_err, vector_error = %vector_err, "both stores failed to write");
                self.compensate(recording_id, &format!("{graph_err}; {vector_err}")).await;
                log_ingestion_completed(SERVICE_NAME, &recording_id_str, chunks.len(), duration_ms, OperationResult::Failure, Some(&format!("{graph_err}; {vector_err}")));
                Err(graph_err)
            }
        }
    }
}
