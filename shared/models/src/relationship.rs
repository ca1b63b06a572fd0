//! Graph edges: chunk-to-entity mentions, chunk-to-chunk sequence, and typed
//! edges inferred between entities co-mentioned in the same chunk.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityType;

/// `MENTIONS(chunk -> entity)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionsEdge {
    pub chunk_id: Uuid,
    pub entity_id: Uuid,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

/// `FOLLOWED_BY(chunk -> chunk)` between consecutive chunks of one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedByEdge {
    pub from_chunk_id: Uuid,
    pub to_chunk_id: Uuid,
    pub sequence_order: usize,
}

/// Typed relation between two co-mentioned entities, selected by the first
/// matching rule in `infer_relation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityRelationType {
    WorksFor,
    LocatedIn,
    BasedIn,
    AssociatedWith,
    CoOccursWith,
}

impl EntityRelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorksFor => "WORKS_FOR",
            Self::LocatedIn => "LOCATED_IN",
            Self::BasedIn => "BASED_IN",
            Self::AssociatedWith => "ASSOCIATED_WITH",
            Self::CoOccursWith => "CO_OCCURS_WITH",
        }
    }
}

/// First-match-wins inference of relation type and base strength between two
/// co-mentioned entity types. The order is significant.
pub fn infer_relation(from: EntityType, to: EntityType) -> (EntityRelationType, f64) {
    use EntityType::*;
    match (from, to) {
        (Person, Organization) => (EntityRelationType::WorksFor, 0.7),
        (Person, Location) => (EntityRelationType::LocatedIn, 0.6),
        (Organization, Location) => (EntityRelationType::BasedIn, 0.8),
        (Person, Person) => (EntityRelationType::AssociatedWith, 0.5),
        _ => (EntityRelationType::CoOccursWith, 0.3),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relation_type: EntityRelationType,
    pub strength: f64,
    pub co_occurrence_count: u64,
}

impl EntityRelationship {
    pub fn new(from_entity_id: Uuid, to_entity_id: Uuid, from_type: EntityType, to_type: EntityType) -> Self {
        let (relation_type, strength) = infer_relation(from_type, to_type);
        Self {
            from_entity_id,
            to_entity_id,
            relation_type,
            strength,
            co_occurrence_count: 1,
        }
    }

    pub fn bump_co_occurrence(&mut self) {
        self.co_occurrence_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_org_works_for() {
        let (rel, strength) = infer_relation(EntityType::Person, EntityType::Organization);
        assert_eq!(rel, EntityRelationType::WorksFor);
        assert_eq!(strength, 0.7);
    }

    #[test]
    fn unmatched_pair_falls_back_to_co_occurs() {
        let (rel, strength) = infer_relation(EntityType::Date, EntityType::Percentage);
        assert_eq!(rel, EntityRelationType::CoOccursWith);
        assert_eq!(strength, 0.3);
    }

    #[test]
    fn org_location_ordering_takes_precedence_over_generic() {
        let (rel, _) = infer_relation(EntityType::Organization, EntityType::Location);
        assert_eq!(rel, EntityRelationType::BasedIn);
    }
}
