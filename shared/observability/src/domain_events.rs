//! Domain event logging for the retrieval core.
//!
//! Provides structured logging for business domain events with consistent schema.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of a domain operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failure,
    Partial,
    Skipped,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Partial => write!(f, "partial"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Categories of domain events for filtering and routing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Ingestion,
    Chunking,
    EntityExtraction,
    Retrieval,
    Aggregation,
    Ranking,
    Prompt,
    System,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingestion => write!(f, "ingestion"),
            Self::Chunking => write!(f, "chunking"),
            Self::EntityExtraction => write!(f, "entity_extraction"),
            Self::Retrieval => write!(f, "retrieval"),
            Self::Aggregation => write!(f, "aggregation"),
            Self::Ranking => write!(f, "ranking"),
            Self::Prompt => write!(f, "prompt"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A structured domain event for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// Category of the event
    pub category: EventCategory,
    /// Specific event type (e.g., "recording_ingested", "strategy_selected")
    pub event_type: String,
    /// Entity type being operated on (e.g., "recording", "session")
    pub entity_type: Option<String>,
    /// Entity ID
    pub entity_id: Option<String>,
    /// Result of the operation
    pub result: OperationResult,
    /// Duration in milliseconds (if applicable)
    pub duration_ms: Option<u64>,
    /// Error message if failed
    pub error: Option<String>,
    /// Owning user, for per-tenant log correlation
    pub user_id: Option<Uuid>,
    /// Service that emitted the event
    pub service: String,
    /// Additional structured metadata
    pub metadata: Option<serde_json::Value>,
}

impl DomainEvent {
    /// Create a new domain event builder
    pub fn new(service: impl Into<String>, category: EventCategory, event_type: impl Into<String>) -> DomainEventBuilder {
        DomainEventBuilder {
            service: service.into(),
            category,
            event_type: event_type.into(),
            entity_type: None,
            entity_id: None,
            result: OperationResult::Success,
            duration_ms: None,
            error: None,
            user_id: None,
            metadata: None,
        }
    }
}

/// Builder for constructing domain events
pub struct DomainEventBuilder {
    service: String,
    category: EventCategory,
    event_type: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    result: OperationResult,
    duration_ms: Option<u64>,
    error: Option<String>,
    user_id: Option<Uuid>,
    metadata: Option<serde_json::Value>,
}

impl DomainEventBuilder {
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn result(mut self, result: OperationResult) -> Self {
        self.result = result;
        self
    }

    pub fn success(mut self) -> Self {
        self.result = OperationResult::Success;
        self
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.result = OperationResult::Failure;
        self.error = Some(error.into());
        self
    }

    pub fn partial(mut self) -> Self {
        self.result = OperationResult::Partial;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build and emit the event as a log
    pub fn emit(self) {
        let event = self.build();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());

        match event.result {
            OperationResult::Success => tracing::info!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "success",
                "DomainEvent: {}", json
            ),
            OperationResult::Failure => tracing::error!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "failure",
                error = ?event.error,
                "DomainEvent: {}", json
            ),
            OperationResult::Partial => tracing::warn!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "partial",
                "DomainEvent: {}", json
            ),
            OperationResult::Skipped => tracing::debug!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "skipped",
                "DomainEvent: {}", json
            ),
        }
    }

    /// Build the event without emitting
    pub fn build(self) -> DomainEvent {
        DomainEvent {
            timestamp: Utc::now(),
            category: self.category,
            event_type: self.event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            result: self.result,
            duration_ms: self.duration_ms,
            error: self.error,
            user_id: self.user_id,
            service: self.service,
            metadata: self.metadata,
        }
    }
}

/// Log a recording's ingestion completing (success or failure)
pub fn log_ingestion_completed(
    service: &str,
    recording_id: &str,
    chunks_written: usize,
    duration_ms: u64,
    result: OperationResult,
    error: Option<&str>,
) {
    let mut builder = DomainEvent::new(service, EventCategory::Ingestion, "recording_ingested")
        .entity("recording", recording_id)
        .duration_ms(duration_ms)
        .metadata(serde_json::json!({ "chunks_written": chunks_written }))
        .result(result.clone());

    if let (OperationResult::Failure, Some(err)) = (&result, error) {
        builder = builder.failure(err);
    }

    builder.emit();
}

/// Log a strategy selection made by the aggregator
pub fn log_strategy_selected(service: &str, strategy: &str, preset: &str, query_len: usize) {
    DomainEvent::new(service, EventCategory::Aggregation, "strategy_selected")
        .metadata(serde_json::json!({
            "strategy": strategy,
            "ranking_preset": preset,
            "query_len": query_len,
        }))
        .success()
        .emit();
}

/// Log a retriever failing open during aggregation (isolated, does not abort)
pub fn log_retriever_failed_open(service: &str, retriever: &str, error: &str) {
    DomainEvent::new(service, EventCategory::Aggregation, "retriever_failed_open")
        .entity("retriever", retriever)
        .partial()
        .metadata(serde_json::json!({ "error": error }))
        .emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_event_builder() {
        let event = DomainEvent::new("retrieval-core", EventCategory::Ingestion, "recording_ingested")
            .entity("recording", "123")
            .duration_ms(100)
            .success()
            .build();

        assert_eq!(event.service, "retrieval-core");
        assert_eq!(event.event_type, "recording_ingested");
        assert_eq!(event.entity_id, Some("123".to_string()));
        assert_eq!(event.result, OperationResult::Success);
    }
}
