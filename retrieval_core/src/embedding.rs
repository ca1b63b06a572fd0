//! Turns query and chunk text into vectors for the vector store. As with
//! `EntityExtractor`, the core defines only the seam (`Embedder`); no model
//! integration ships here. `HashingEmbedder` is a deterministic bag-of-words
//! fake sufficient to exercise the vector retriever without an external model.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::CoreResult;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;
}

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut vector = vec![0f32; self.dimensions];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let slot = (hasher.finish() as usize) % self.dimensions;
            vector[slot] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_normalized() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed("the quick brown fox").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
