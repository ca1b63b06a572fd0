//! Error kinds for the retrieval core, kept few and specific per the
//! host repository's `graph_rag/src/errors.rs` pattern (minus its HTTP
//! response mapping, which belongs to an out-of-scope request surface).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("upstream {store} error: {message}")]
    Upstream { store: &'static str, message: String },

    #[error("partial result: {0}")]
    Partial(String),

    #[error("consistency violation in {store}: {message}")]
    Consistency { store: &'static str, message: String },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn upstream_vector(message: impl Into<String>) -> Self {
        Self::Upstream { store: "vector", message: message.into() }
    }

    pub fn upstream_graph(message: impl Into<String>) -> Self {
        Self::Upstream { store: "graph", message: message.into() }
    }

    pub fn consistency_vector(message: impl Into<String>) -> Self {
        Self::Consistency { store: "vector", message: message.into() }
    }

    pub fn consistency_graph(message: impl Into<String>) -> Self {
        Self::Consistency { store: "graph", message: message.into() }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_carries_store_name() {
        let err = CoreError::upstream_graph("connection refused");
        match err {
            CoreError::Upstream { store, .. } => assert_eq!(store, "graph"),
            _ => panic!("wrong variant"),
        }
    }
}
