//! The dual-memory retrieval core: ingestion (chunking, entity extraction,
//! dual-store writing), the vector and graph retrievers, the aggregator that
//! picks a strategy and fans out to both, the ranker that unifies their
//! results under one explainable score, and the session-aware prompt
//! composer that turns ranked results into a prompt for a language model.
//!
//! Stores, the entity extractor, and the embedder are trait seams
//! (`VectorStore`, `GraphStore`, `IngestionLedger`, `EntityExtractor`,
//! `Embedder`); this crate ships in-memory fakes and one rule-based/hashing
//! implementation of each, and expects a real deployment to supply
//! `qdrant-client`/`neo4rs`-backed stores and a model-backed extractor/embedder.

pub mod aggregator;
pub mod chunker;
pub mod embedding;
pub mod entity;
pub mod error;
pub mod ingestion;
pub mod prompt;
pub mod ranker;
pub mod retrieval;
pub mod stores;

pub use aggregator::{AggregationMetrics, AggregationStrategy, Aggregator, QueryAnalysis};
pub use chunker::Chunker;
pub use embedding::{Embedder, HashingEmbedder};
pub use entity::{EntityExtractor, ExtractedEntity, RuleBasedExtractor};
pub use error::{CoreError, CoreResult};
pub use ingestion::{IngestionReport, IngestionWriter};
pub use prompt::{ComposedPrompt, PromptComposer, RecentTranscript};
pub use ranker::{FactorBreakdown, RankedResult, Ranker, RankingPreset};
pub use retrieval::{GraphRetriever, VectorRetriever};
pub use stores::{GraphStore, InMemoryGraphStore, InMemoryIngestionLedger, InMemoryVectorStore, IngestionLedger, LedgerStatus, VectorRecord, VectorStore};
