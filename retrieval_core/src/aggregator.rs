//! Context aggregator: analyzes the query, selects a retrieval strategy,
//! runs retrievers concurrently with isolated failure, deduplicates by id,
//! and delegates final scoring to the ranker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::entity::EntityExtractor;
use crate::error::CoreResult;
use crate::ranker::{RankedResult, Ranker, RankingPreset};
use crate::retrieval::{apply_filters_in_process, GraphRetriever, VectorRetriever};
use memoria_models::{Filter, RetrievalResult};
use memoria_observability::{log_retriever_failed_open, log_strategy_selected};

const SERVICE_NAME: &str = "retrieval_core";

const SEMANTIC_KEYWORDS: &[&str] = &["like", "similar", "about", "concept"];
const COMPLEX_GRAPH_KEYWORDS: &[&str] = &["relationship", "connection", "link", "interaction"];
const TEMPORAL_KEYWORDS: &[&str] = &["when", "recent", "yesterday", "last week", "today", "earlier", "before", "after"];

#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub entity_count: usize,
    pub has_semantic_keywords: bool,
    pub has_complex_graph_keywords: bool,
    pub has_temporal_cues: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregationStrategy {
    VectorOnly,
    GraphOnly,
    Hybrid { vector_weight: f64, graph_weight: f64 },
    Ensemble,
    Adaptive,
    GraphTraversal,
}

#[derive(Debug, Clone)]
pub struct AggregationMetrics {
    pub total_candidates: usize,
    pub duplicates_removed: usize,
    pub vector_count: usize,
    pub graph_count: usize,
    pub strategy_used: String,
    pub stage_timings: HashMap<String, Duration>,
}

async fn analyze_query(extractor: &dyn EntityExtractor, query: &str) -> CoreResult<QueryAnalysis> {
    let entities = extractor.extract(query, "en").await?;
    let lowered = query.to_lowercase();

    Ok(QueryAnalysis {
        entity_count: entities.len(),
        has_semantic_keywords: SEMANTIC_KEYWORDS.iter().any(|k| lowered.contains(k)),
        has_complex_graph_keywords: COMPLEX_GRAPH_KEYWORDS.iter().any(|k| lowered.contains(k)),
        has_temporal_cues: TEMPORAL_KEYWORDS.iter().any(|k| lowered.contains(k)),
    })
}

/// Resolve `Adaptive` into a concrete strategy and ranking preset. Other
/// strategies pass through with the "ensemble" preset as a neutral default.
fn resolve_strategy(requested: AggregationStrategy, analysis: &QueryAnalysis) -> (AggregationStrategy, &'static str) {
    match requested {
        AggregationStrategy::Adaptive => {
            if analysis.entity_count > 2 {
                (AggregationStrategy::Hybrid { vector_weight: 0.4, graph_weight: 0.6 }, "entity-focused")
            } else if analysis.has_semantic_keywords && analysis.entity_count == 0 {
                (AggregationStrategy::Hybrid { vector_weight: 0.8, graph_weight: 0.2 }, "semantic-only")
            } else if analysis.has_temporal_cues {
                (AggregationStrategy::Ensemble, "temporal-boost")
            } else {
                (AggregationStrategy::Ensemble, "ensemble")
            }
        }
        other => (other, "ensemble"),
    }
}

fn strategy_label(strategy: &AggregationStrategy) -> &'static str {
    match strategy {
        AggregationStrategy::VectorOnly => "vector_only",
        AggregationStrategy::GraphOnly => "graph_only",
        AggregationStrategy::Hybrid { .. } => "hybrid",
        AggregationStrategy::Ensemble => "ensemble",
        AggregationStrategy::Adaptive => "adaptive",
        AggregationStrategy::GraphTraversal => "graph_traversal",
    }
}

pub struct Aggregator {
    vector_retriever: Arc<VectorRetriever>,
    graph_retriever: Arc<GraphRetriever>,
    extractor: Arc<dyn EntityExtractor>,
    ranker: Ranker,
}

impl Aggregator {
    pub fn new(vector_retriever: Arc<VectorRetriever>, graph_retriever: Arc<GraphRetriever>, extractor: Arc<dyn EntityExtractor>, ranker: Ranker) -> Self {
        Self { vector_retriever, graph_retriever, extractor, ranker }
    }

    async fn run_vector(&self, query: &str, filters: &[Filter], limit: usize, user_id: Option<Uuid>) -> Vec<RetrievalResult> {
        match self.vector_retriever.search(query, filters, limit, user_id).await {
            Ok(results) => results,
            Err(err) => {
                log_retriever_failed_open(SERVICE_NAME, "vector", &err.to_string());
                Vec::new()
            }
        }
    }

    async fn run_graph(&self, query: &str, filters: &[Filter], limit: usize, user_id: Uuid) -> Vec<RetrievalResult> {
        match self.graph_retriever.search(query, filters, limit, user_id).await {
            Ok(results) => results,
            Err(err) => {
                log_retriever_failed_open(SERVICE_NAME, "graph", &err.to_string());
                Vec::new()
            }
        }
    }

    /// With 2+ entities, paths between the first two; with one, entity-mention
    /// search; with none, falls back to a balanced `Hybrid` run across both
    /// stores. Returns `(vector_results, graph_results)` so the caller can
    /// attribute `AggregationMetrics` counts to whichever store actually ran.
    async fn run_graph_traversal(
        &self,
        query: &str,
        filters: &[Filter],
        user_id: Uuid,
        limit: usize,
    ) -> CoreResult<(Vec<RetrievalResult>, Vec<RetrievalResult>)> {
        let entities = self.extractor.extract(query, "en").await?;
        match entities.len() {
            0 => {
                let balanced_limit = ((limit as f64) * 0.5 * 1.5).max(1.0) as usize;
                let (vector_results, graph_results) = tokio::join!(
                    self.run_vector(query, filters, balanced_limit, Some(user_id)),
                    self.run_graph(query, filters, balanced_limit, user_id),
                );
                Ok((vector_results, graph_results))
            }
            1 => {
                let results = self.graph_retriever.find_entity_mentions(&entities[0].surface_form, user_id, limit).await.unwrap_or_default();
                Ok((Vec::new(), apply_filters_in_process(results, filters)))
            }
            _ => {
                let results = self
                    .graph_retriever
                    .find_paths_between_entities(&entities[0].surface_form, &entities[1].surface_form, None, user_id)
                    .await
                    .unwrap_or_default();
                Ok((Vec::new(), apply_filters_in_process(results, filters)))
            }
        }
    }

    #[tracing::instrument(skip(self, filters))]
    pub async fn aggregate(
        &self,
        query: &str,
        user_id: Option<Uuid>,
        filters: &[Filter],
        max_results: usize,
        strategy: AggregationStrategy,
    ) -> CoreResult<(Vec<RankedResult>, AggregationMetrics)> {
        let mut stage_timings = HashMap::new();

        let analysis = analyze_query(self.extractor.as_ref(), query).await?;
        let (resolved, preset_name) = resolve_strategy(strategy, &analysis);
        log_strategy_selected(SERVICE_NAME, strategy_label(&resolved), preset_name, query.len());

        let retrieval_start = Instant::now();
        let (vector_results, graph_results): (Vec<RetrievalResult>, Vec<RetrievalResult>) = match resolved {
            AggregationStrategy::VectorOnly => (self.run_vector(query, filters, max_results, user_id).await, Vec::new()),
            AggregationStrategy::GraphOnly => {
                let uid = user_id.unwrap_or_else(Uuid::nil);
                (Vec::new(), self.run_graph(query, filters, max_results, uid).await)
            }
            AggregationStrategy::Hybrid { vector_weight, graph_weight } => {
                let vector_limit = ((max_results as f64) * vector_weight * 1.5) as usize;
                let graph_limit = ((max_results as f64) * graph_weight * 1.5) as usize;
                let uid = user_id.unwrap_or_else(Uuid::nil);
                tokio::join!(
                    self.run_vector(query, filters, vector_limit.max(1), user_id),
                    self.run_graph(query, filters, graph_limit.max(1), uid),
                )
            }
            AggregationStrategy::Ensemble => {
                let limit = ((max_results as f64) * 0.5 * 1.5).max(1.0) as usize;
                let uid = user_id.unwrap_or_else(Uuid::nil);
                tokio::join!(self.run_vector(query, filters, limit, user_id), self.run_graph(query, filters, limit, uid))
            }
            AggregationStrategy::GraphTraversal => {
                let uid = user_id.unwrap_or_else(Uuid::nil);
                self.run_graph_traversal(query, filters, uid, max_results).await?
            }
            AggregationStrategy::Adaptive => unreachable!("adaptive is resolved before dispatch"),
        };
        stage_timings.insert("retrieval".to_string(), retrieval_start.elapsed());

        let vector_count = vector_results.len();
        let graph_count = graph_results.len();
        let total_candidates = vector_count + graph_count;

        let dedup_start = Instant::now();
        let mut merged: HashMap<String, RetrievalResult> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for result in vector_results.into_iter().chain(graph_results.into_iter()) {
            match merged.remove(&result.id) {
                Some(existing) => {
                    merged.insert(result.id.clone(), existing.merge_with(result));
                }
                None => {
                    order.push(result.id.clone());
                    merged.insert(result.id.clone(), result);
                }
            }
        }
        let deduped: Vec<RetrievalResult> = order.into_iter().filter_map(|id| merged.remove(&id)).collect();
        let duplicates_removed = total_candidates.saturating_sub(deduped.len());
        stage_timings.insert("dedup".to_string(), dedup_start.elapsed());

        let ranking_start = Instant::now();
        let preset = RankingPreset::for_name(preset_name);
        let mut ranked = self.ranker.rank(deduped, query, &preset);
        ranked.truncate(max_results);
        stage_timings.insert("ranking".to_string(), ranking_start.elapsed());

        let metrics = AggregationMetrics {
            total_candidates,
            duplicates_removed,
            vector_count,
            graph_count,
            strategy_used: preset_name.to_string(),
            stage_timings,
        };

        Ok((ranked, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::entity::RuleBasedExtractor;
    use crate::stores::{InMemoryGraphStore, InMemoryVectorStore, VectorRecord};
    use memoria_config::RankingWeights;
    use memoria_models::Chunk;

    async fn build_aggregator() -> (Aggregator, Uuid) {
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let graph_store = Arc::new(InMemoryGraphStore::new());
        let embedder = Arc::new(HashingEmbedder::default());
        let user_id = Uuid::new_v4();
        let recording_id = Uuid::new_v4();

        let chunk = Chunk::new(recording_id, user_id, "Acme Corp launched a new product yesterday.".to_string(), 0, 44, 0, 1, "en".to_string());
        let embedding = embedder.embed(&chunk.content).await.unwrap();
        vector_store.upsert(vec![VectorRecord { chunk: chunk.clone(), embedding }]).await.unwrap();

        use crate::stores::GraphStore;
        graph_store.upsert_chunk(chunk).await.unwrap();

        let vector_retriever = Arc::new(crate::retrieval::VectorRetriever::new(vector_store, embedder, "chunks", 0.0));
        let graph_retriever = Arc::new(GraphRetriever::new(graph_store));
        let extractor: Arc<dyn EntityExtractor> = Arc::new(RuleBasedExtractor::new());
        let ranker = Ranker::new(RankingWeights::default());

        (Aggregator::new(vector_retriever, graph_retriever, extractor, ranker), user_id)
    }

    #[tokio::test]
    async fn vector_only_strategy_returns_ranked_results() {
        let (aggregator, user_id) = build_aggregator().await;
        let (ranked, metrics) = aggregator
            .aggregate("new product", Some(user_id), &[], 5, AggregationStrategy::VectorOnly)
            .await
            .unwrap();
        assert!(!ranked.is_empty());
        assert_eq!(metrics.graph_count, 0);
    }

    #[tokio::test]
    async fn graph_traversal_with_zero_entities_falls_back_to_hybrid() {
        let (aggregator, user_id) = build_aggregator().await;
        let (ranked, metrics) = aggregator
            .aggregate("new product", Some(user_id), &[], 5, AggregationStrategy::GraphTraversal)
            .await
            .unwrap();
        assert!(!ranked.is_empty());
        assert!(metrics.vector_count > 0, "0-entity graph_traversal must still query the vector store");
        assert!(metrics.graph_count > 0, "0-entity graph_traversal must still query the graph store");
    }

    #[tokio::test]
    async fn adaptive_picks_temporal_boost_for_temporal_cues() {
        let (aggregator, user_id) = build_aggregator().await;
        let (_, metrics) = aggregator
            .aggregate("what happened yesterday", Some(user_id), &[], 5, AggregationStrategy::Adaptive)
            .await
            .unwrap();
        assert_eq!(metrics.strategy_used, "temporal-boost");
    }

    #[tokio::test]
    async fn stage_timings_include_all_three_stages() {
        let (aggregator, user_id) = build_aggregator().await;
        let (_, metrics) = aggregator
            .aggregate("new product", Some(user_id), &[], 5, AggregationStrategy::Ensemble)
            .await
            .unwrap();
        assert!(metrics.stage_timings.contains_key("retrieval"));
        assert!(metrics.stage_timings.contains_key("dedup"));
        assert!(metrics.stage_timings.contains_key("ranking"));
    }
}
