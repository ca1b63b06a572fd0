//! Ranker: combines heterogeneous retrieval results into a unified [0,1]
//! score from five weighted factors, with a per-factor breakdown for display.
//!
//! Grounded in `original_source/backend/services/context_ranker.py`. Where
//! the original reaches into a generic dict with a multi-key fallback chain
//! (`_extract_field` trying `"score"`, `"similarity"`, `"relevance_score"`...),
//! this implementation uses one explicit accessor per factor instead -- there
//! is no generic field-name guessing anywhere below.

use chrono::Utc;
use std::collections::HashSet;

use memoria_config::RankingWeights;
use memoria_models::RetrievalResult;

/// Multipliers a strategy preset applies to raw factor scores before
/// weighting, capped at 1.0 after scaling.
#[derive(Debug, Clone, Copy)]
pub struct RankingPreset {
    pub semantic: f64,
    pub graph: f64,
    pub recency: f64,
    pub entity_overlap: f64,
    pub content_quality: f64,
}

impl Default for RankingPreset {
    fn default() -> Self {
        Self { semantic: 1.0, graph: 1.0, recency: 1.0, entity_overlap: 1.0, content_quality: 1.0 }
    }
}

impl RankingPreset {
    pub fn for_name(name: &str) -> Self {
        match name {
            "semantic-only" => Self { semantic: 1.2, graph: 0.5, recency: 0.5, entity_overlap: 0.5, content_quality: 0.5 },
            "structural-only" => Self { semantic: 0.5, graph: 1.2, recency: 0.5, entity_overlap: 0.5, content_quality: 0.5 },
            "temporal-boost" => Self { recency: 1.5, ..Self::default() },
            "entity-focused" => Self { entity_overlap: 1.3, graph: 1.3, ..Self::default() },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FactorBreakdown {
    pub semantic_similarity: f64,
    pub graph_centrality: f64,
    pub recency: f64,
    pub entity_overlap: f64,
    pub content_quality: f64,
}

#[derive(Debug, Clone)]
pub struct RankedResult {
    pub result: RetrievalResult,
    pub unified_score: f64,
    pub factors: FactorBreakdown,
}

fn word_overlap_ratio(query: &str, content: &str) -> f64 {
    let query_words: HashSet<String> = query.to_lowercase().split_whitespace().map(String::from).collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let content_words: HashSet<String> = content.to_lowercase().split_whitespace().map(String::from).collect();
    let overlap = query_words.intersection(&content_words).count();
    overlap as f64 / query_words.len() as f64
}

fn semantic_similarity(result: &RetrievalResult, query: &str) -> f64 {
    if result.source.split(',').any(|tag| tag.starts_with("chromadb")) {
        result.score
    } else {
        word_overlap_ratio(query, &result.content)
    }
}

fn graph_centrality(result: &RetrievalResult) -> f64 {
    if result.source.split(',').any(|tag| tag.starts_with("neo4j")) {
        result.score
    } else {
        (result.entities.len() as f64 * 0.2 + result.relationships.len() as f64 * 0.1).min(1.0)
    }
}

fn recency(result: &RetrievalResult) -> f64 {
    let Some(timestamp) = result.timestamp else {
        return 0.5;
    };
    let age_days = (Utc::now() - timestamp).num_days();
    match age_days {
        d if d <= 0 => 1.0,
        d if d <= 7 => 0.9,
        d if d <= 30 => 0.8,
        d if d <= 90 => 0.6,
        d if d <= 365 => 0.4,
        _ => 0.2,
    }
}

fn entity_overlap(result: &RetrievalResult, query: &str) -> f64 {
    let query_words: HashSet<String> = query.to_lowercase().split_whitespace().map(String::from).collect();
    let entity_surfaces: HashSet<String> = result.entities.iter().map(|e| e.surface_form.to_lowercase()).collect();
    if query_words.is_empty() || entity_surfaces.is_empty() {
        return 0.0;
    }
    let overlap = query_words.intersection(&entity_surfaces).count();
    let smaller = query_words.len().min(entity_surfaces.len());
    overlap as f64 / smaller as f64
}

fn length_band_score(len: usize) -> f64 {
    match len {
        0..=49 => 0.3,
        50..=1000 => 1.0,
        1001..=3000 => 0.7,
        _ => 0.5,
    }
}

fn readability_score(content: &str) -> f64 {
    let word_count = content.split_whitespace().count().max(1);
    let sentence_count = content.chars().filter(|c| matches!(c, '.' | '!' | '?')).count().max(1);
    let words_per_sentence = word_count as f64 / sentence_count as f64;

    if (10.0..=25.0).contains(&words_per_sentence) {
        1.0
    } else if words_per_sentence < 5.0 {
        0.5
    } else if words_per_sentence > 40.0 {
        0.6
    } else if words_per_sentence < 10.0 {
        // linear interpolation between (5, 0.5) and (10, 1.0)
        0.5 + (words_per_sentence - 5.0) / 5.0 * 0.5
    } else {
        // linear interpolation between (25, 1.0) and (40, 0.6)
        1.0 - (words_per_sentence - 25.0) / 15.0 * 0.4
    }
}

fn content_quality(content: &str) -> f64 {
    (length_band_score(content.chars().count()) + readability_score(content)) / 2.0
}

pub struct Ranker {
    weights: RankingWeights,
}

impl Ranker {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    pub fn rank(&self, results: Vec<RetrievalResult>, query: &str, preset: &RankingPreset) -> Vec<RankedResult> {
        let mut ranked: Vec<RankedResult> = results
            .into_iter()
            .map(|result| {
                let factors = FactorBreakdown {
                    semantic_similarity: (semantic_similarity(&result, query) * preset.semantic).min(1.0),
                    graph_centrality: (graph_centrality(&result) * preset.graph).min(1.0),
                    recency: (recency(&result) * preset.recency).min(1.0),
                    entity_overlap: (entity_overlap(&result, query) * preset.entity_overlap).min(1.0),
                    content_quality: (content_quality(&result.content) * preset.content_quality).min(1.0),
                };

                let unified_score = (factors.semantic_similarity * self.weights.semantic_similarity
                    + factors.graph_centrality * self.weights.graph_centrality
                    + factors.recency * self.weights.recency
                    + factors.entity_overlap * self.weights.entity_overlap
                    + factors.content_quality * self.weights.content_quality)
                    .clamp(0.0, 1.0);

                RankedResult { result, unified_score, factors }
            })
            .collect();

        ranked.sort_by(|a, b| b.unified_score.partial_cmp(&a.unified_score).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_models::ResultType;

    fn sample_result(content: &str, source: &str, score: f64) -> RetrievalResult {
        let mut r = RetrievalResult::new("1", ResultType::Chunk, content, source);
        r.score = score;
        r
    }

    #[test]
    fn unified_score_is_clamped_to_unit_interval() {
        let ranker = Ranker::new(RankingWeights::default());
        let ranked = ranker.rank(vec![sample_result("hello world", "chromadb.chunks", 1.5)], "hello", &RankingPreset::default());
        assert!(ranked[0].unified_score <= 1.0);
    }

    #[test]
    fn content_quality_penalizes_very_short_content() {
        assert!(content_quality("hi") < content_quality(&"word ".repeat(100)));
    }

    #[test]
    fn missing_timestamp_scores_recency_at_half() {
        let mut result = sample_result("hello world", "chromadb.chunks", 0.5);
        result.timestamp = None;
        assert_eq!(recency(&result), 0.5);
    }

    #[test]
    fn temporal_boost_preset_scales_recency() {
        let preset = RankingPreset::for_name("temporal-boost");
        assert_eq!(preset.recency, 1.5);
        assert_eq!(preset.semantic, 1.0);
    }

    #[test]
    fn entity_focused_preset_boosts_entity_overlap_and_graph() {
        let preset = RankingPreset::for_name("entity-focused");
        assert_eq!(preset.entity_overlap, 1.3);
        assert_eq!(preset.graph, 1.3);
    }

    #[test]
    fn results_sorted_descending_by_unified_score() {
        let ranker = Ranker::new(RankingWeights::default());
        let results = vec![
            sample_result("irrelevant text here", "chromadb.chunks", 0.1),
            sample_result("hello world", "chromadb.chunks", 0.9),
        ];
        let ranked = ranker.rank(results, "hello world", &RankingPreset::default());
        assert!(ranked[0].unified_score >= ranked[1].unified_score);
    }
}
