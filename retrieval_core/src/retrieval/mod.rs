//! Retrieval: vector and graph retrievers over the result shape in
//! `memoria_models::result`, using the shared filter algebra in
//! `memoria_models::filter`.

pub mod graph;
pub mod vector;

pub use graph::GraphRetriever;
pub use vector::VectorRetriever;

use memoria_models::{Filter, RetrievalResult};

/// Apply filters not already pushed down to the backing store.
pub fn apply_filters_in_process(results: Vec<RetrievalResult>, filters: &[Filter]) -> Vec<RetrievalResult> {
    if filters.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|r| {
            let target = serde_json::json!({
                "id": r.id,
                "content": r.content,
                "metadata": r.metadata,
                "score": r.score,
                "source": r.source,
            });
            filters.iter().all(|f| f.evaluate(&target))
        })
        .collect()
}
