//! Environment-driven configuration for the memoria retrieval core.
//!
//! Mirrors the host repository's `AppConfig::from_env()` / `DatabaseConfig::from_env()`
//! convention: one struct, one `from_env()` constructor, documented defaults for
//! everything. Connection lifecycle for the backing stores is owned by the process
//! bootstrap, not by this struct -- `Config` carries URLs and tuning knobs only.

use std::env;
use std::time::Duration;

fn env_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Ranking factor weights, must sum to 1.0 (see `memoria_retrieval_core::ranker`).
#[derive(Debug, Clone, PartialEq)]
pub struct RankingWeights {
    pub semantic_similarity: f64,
    pub graph_centrality: f64,
    pub recency: f64,
    pub entity_overlap: f64,
    pub content_quality: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            semantic_similarity: 0.4,
            graph_centrality: 0.3,
            recency: 0.2,
            entity_overlap: 0.1,
            content_quality: 0.0,
        }
    }
}

/// Chunker window sizing, configuration-driven per the host repository's
/// `chunker` service, which exposes window/overlap as a selectable profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerConfig {
    pub window_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window_chars: 1000,
            overlap_chars: 100,
        }
    }
}

/// Top-level configuration for the retrieval core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Qdrant endpoint, e.g. "http://localhost:6334"
    pub vector_store_url: String,
    /// Default vector collection name
    pub vector_collection: String,
    /// Neo4j connection URI, e.g. "bolt://localhost:7687"
    pub graph_store_url: String,
    pub graph_store_user: String,
    pub graph_store_password: String,

    pub store_pool_size: u32,
    pub store_connect_timeout: Duration,
    pub store_request_timeout: Duration,

    pub ranking_weights: RankingWeights,
    pub chunker: ChunkerConfig,

    /// Minimum similarity score for a vector candidate to be considered relevant.
    pub similarity_floor: f64,
    /// Number of prior turns retained per conversation session.
    pub session_history_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vector_store_url: "http://localhost:6334".to_string(),
            vector_collection: "chunks".to_string(),
            graph_store_url: "bolt://localhost:7687".to_string(),
            graph_store_user: "neo4j".to_string(),
            graph_store_password: String::new(),
            store_pool_size: 10,
            store_connect_timeout: Duration::from_secs(10),
            store_request_timeout: Duration::from_secs(30),
            ranking_weights: RankingWeights::default(),
            chunker: ChunkerConfig::default(),
            similarity_floor: 0.2,
            session_history_len: 20,
        }
    }
}

impl Config {
    /// Build a `Config` from environment variables, falling back to documented defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            vector_store_url: env_string("VECTOR_STORE_URL", &defaults.vector_store_url),
            vector_collection: env_string("VECTOR_COLLECTION", &defaults.vector_collection),
            graph_store_url: env_string("GRAPH_STORE_URL", &defaults.graph_store_url),
            graph_store_user: env_string("GRAPH_STORE_USER", &defaults.graph_store_user),
            graph_store_password: env_string("GRAPH_STORE_PASSWORD", &defaults.graph_store_password),
            store_pool_size: env_var("STORE_POOL_SIZE", defaults.store_pool_size),
            store_connect_timeout: Duration::from_secs(env_var(
                "STORE_CONNECT_TIMEOUT_SECONDS",
                defaults.store_connect_timeout.as_secs(),
            )),
            store_request_timeout: Duration::from_secs(env_var(
                "STORE_REQUEST_TIMEOUT_SECONDS",
                defaults.store_request_timeout.as_secs(),
            )),
            ranking_weights: RankingWeights {
                semantic_similarity: env_var("RANK_WEIGHT_SEMANTIC", defaults.ranking_weights.semantic_similarity),
                graph_centrality: env_var("RANK_WEIGHT_GRAPH", defaults.ranking_weights.graph_centrality),
                recency: env_var("RANK_WEIGHT_RECENCY", defaults.ranking_weights.recency),
                entity_overlap: env_var("RANK_WEIGHT_ENTITY_OVERLAP", defaults.ranking_weights.entity_overlap),
                content_quality: env_var("RANK_WEIGHT_CONTENT_QUALITY", defaults.ranking_weights.content_quality),
            },
            chunker: ChunkerConfig {
                window_chars: env_var("CHUNKER_WINDOW_CHARS", defaults.chunker.window_chars),
                overlap_chars: env_var("CHUNKER_OVERLAP_CHARS", defaults.chunker.overlap_chars),
            },
            similarity_floor: env_var("SIMILARITY_FLOOR", defaults.similarity_floor),
            session_history_len: env_var("SESSION_HISTORY_LEN", defaults.session_history_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ranking_weights_sum_to_one() {
        let w = RankingWeights::default();
        let sum = w.semantic_similarity + w.graph_centrality + w.recency + w.entity_overlap + w.content_quality;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_chunker_matches_documented_defaults() {
        let c = ChunkerConfig::default();
        assert_eq!(c.window_chars, 1000);
        assert_eq!(c.overlap_chars, 100);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        env::remove_var("VECTOR_STORE_URL");
        let cfg = Config::from_env();
        assert_eq!(cfg.vector_store_url, "http://localhost:6334");
    }
}
