//! Entities are named things mentioned in one or more chunks. Identity is
//! `(normalized form, type, user_id)`: a second mention updates the existing
//! node's counters rather than creating a duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ENTITY_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x65, 0x6d, 0x6f, 0x72, 0x69, 0x61, 0x2d, 0x65, 0x6e, 0x74, 0x69, 0x74, 0x79, 0x2d, 0x6e,
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    MonetaryValue,
    Date,
    Time,
    Percentage,
    Event,
    Product,
    WorkOfArt,
    Law,
    Language,
    Generic,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Location => "location",
            Self::MonetaryValue => "monetary_value",
            Self::Date => "date",
            Self::Time => "time",
            Self::Percentage => "percentage",
            Self::Event => "event",
            Self::Product => "product",
            Self::WorkOfArt => "work_of_art",
            Self::Law => "law",
            Self::Language => "language",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lower-case, collapse punctuation to spaces, collapse runs of whitespace.
pub fn normalize_entity_text(surface_form: &str) -> String {
    let lowered = surface_form.to_lowercase();
    let spaced: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive a stable entity id from its identity tuple, so repeated ingestion
/// resolves to the same node without a lookup round trip first.
pub fn derive_entity_id(normalized_form: &str, entity_type: EntityType, user_id: Uuid) -> Uuid {
    let name = format!("{user_id}:{}:{normalized_form}", entity_type.as_str());
    Uuid::new_v5(&ENTITY_ID_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub surface_form: String,
    pub normalized_form: String,
    pub user_id: Uuid,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub mention_count: u64,
    pub confidence: f64,
}

impl Entity {
    /// Create a new entity record from its first observed mention.
    pub fn new(surface_form: &str, entity_type: EntityType, user_id: Uuid, confidence: f64, seen_at: DateTime<Utc>) -> Self {
        let normalized_form = normalize_entity_text(surface_form);
        let entity_id = derive_entity_id(&normalized_form, entity_type, user_id);
        Self {
            entity_id,
            entity_type,
            surface_form: surface_form.to_string(),
            normalized_form,
            user_id,
            first_seen: seen_at,
            last_seen: seen_at,
            mention_count: 1,
            confidence,
        }
    }

    /// Merge a new mention into this entity's running state. `first_seen` never
    /// changes; `last_seen` advances to the new mention's timestamp; confidence
    /// takes the maximum observed so a single strong mention is never diluted
    /// by many weak ones.
    pub fn merge_mention(&mut self, confidence: f64, seen_at: DateTime<Utc>) {
        self.mention_count += 1;
        self.confidence = self.confidence.max(confidence);
        if seen_at > self.last_seen {
            self.last_seen = seen_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_lowercases_and_collapses() {
        assert_eq!(normalize_entity_text("  Acme,  Inc.  "), "acme inc");
    }

    #[test]
    fn identity_is_stable_across_user_and_type() {
        let user_id = Uuid::new_v4();
        let a = derive_entity_id("acme inc", EntityType::Organization, user_id);
        let b = derive_entity_id("acme inc", EntityType::Organization, user_id);
        assert_eq!(a, b);

        let other_user = Uuid::new_v4();
        let c = derive_entity_id("acme inc", EntityType::Organization, other_user);
        assert_ne!(a, c);
    }

    #[test]
    fn merge_takes_max_confidence_and_advances_last_seen() {
        let t0 = Utc::now();
        let mut e = Entity::new("Acme", EntityType::Organization, Uuid::new_v4(), 0.5, t0);
        let t1 = t0 + chrono::Duration::seconds(10);
        e.merge_mention(0.3, t1);
        assert_eq!(e.confidence, 0.5);
        assert_eq!(e.last_seen, t1);
        assert_eq!(e.first_seen, t0);
        assert_eq!(e.mention_count, 2);

        e.merge_mention(0.9, t1 + chrono::Duration::seconds(1));
        assert_eq!(e.confidence, 0.9);
    }
}
