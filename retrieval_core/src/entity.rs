//! Entity extraction. `EntityExtractor` is a trait so a model-backed
//! implementation and a deterministic test fake share the same seam; the only
//! concrete implementation shipped here is rule-based.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::CoreResult;
use memoria_models::EntityType;

/// One entity span found in a chunk's text. Positions are relative to the
/// chunk, not the transcript -- the ingestion pipeline re-bases them.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub surface_form: String,
    pub entity_type: EntityType,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract entities from a chunk's text. May return zero entities.
    /// Unknown/unrecognized spans MUST map to `EntityType::Generic`, never be dropped silently.
    async fn extract(&self, text: &str, language: &str) -> CoreResult<Vec<ExtractedEntity>>;
}

fn capitalized_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*\b").expect("valid regex"))
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b")
            .expect("valid regex")
    })
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\s?\d[\d,]*(?:\.\d+)?|\b\d[\d,]*(?:\.\d+)?\s?(?:dollars|USD)\b")
            .expect("valid regex")
    })
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+(?:\.\d+)?\s?%").expect("valid regex"))
}

/// One or more capitalized words followed by a legal-entity suffix, e.g.
/// "Acme Corp" or "Initech Holdings Inc.".
fn organization_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:[A-Z][a-zA-Z]+\s+)+(?:Inc|Incorporated|Corp|Corporation|LLC|Ltd|Co|Company|Group|Holdings)\.?\b")
            .expect("valid regex")
    })
}

/// A capitalized span introduced by a locative preposition, e.g. "in Boston"
/// or "based at Redmond". Group 1 is the place name, excluding the preposition.
fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:[Ii]n|[Aa]t|[Ff]rom|[Nn]ear)\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*)\b")
            .expect("valid regex")
    })
}

/// A capitalized name introduced by a personal title, e.g. "Dr. Jane Ostrin".
/// Group 1 is the name, excluding the title.
fn person_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof|Professor)\.?\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)\b")
            .expect("valid regex")
    })
}

/// Regex-driven extractor: capitalized spans, dates, money amounts, percentages.
/// Sufficient to exercise ingestion end-to-end without an external model.
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    fn scan(re: &Regex, text: &str, entity_type: EntityType, confidence: f64, out: &mut Vec<ExtractedEntity>) {
        for m in re.find_iter(text) {
            if Self::overlaps(out, m.start(), m.end()) {
                continue;
            }
            out.push(ExtractedEntity {
                surface_form: m.as_str().to_string(),
                entity_type,
                start: m.start(),
                end: m.end(),
                confidence,
            });
        }
    }

    /// Like `scan`, but the entity span is capture group 1 rather than the
    /// whole match -- used for rules anchored on context (a preposition, a
    /// title) that should not itself be claimed as part of the span.
    fn scan_captured(re: &Regex, text: &str, entity_type: EntityType, confidence: f64, out: &mut Vec<ExtractedEntity>) {
        for caps in re.captures_iter(text) {
            let Some(name) = caps.get(1) else { continue };
            if Self::overlaps(out, name.start(), name.end()) {
                continue;
            }
            out.push(ExtractedEntity {
                surface_form: name.as_str().to_string(),
                entity_type,
                start: name.start(),
                end: name.end(),
                confidence,
            });
        }
    }

    /// True if `range` overlaps any already-extracted span, so a later, more
    /// generic rule does not re-claim text a more specific rule already matched.
    fn overlaps(existing: &[ExtractedEntity], start: usize, end: usize) -> bool {
        existing.iter().any(|e| start < e.end && e.start < end)
    }
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityExtractor for RuleBasedExtractor {
    async fn extract(&self, text: &str, _language: &str) -> CoreResult<Vec<ExtractedEntity>> {
        let mut found = Vec::new();

        // Specific patterns take priority over the generic capitalized-span rule.
        Self::scan(money_re(), text, EntityType::MonetaryValue, 0.85, &mut found);
        Self::scan(percent_re(), text, EntityType::Percentage, 0.9, &mut found);
        Self::scan(date_re(), text, EntityType::Date, 0.8, &mut found);
        Self::scan(organization_re(), text, EntityType::Organization, 0.6, &mut found);
        Self::scan_captured(location_re(), text, EntityType::Location, 0.55, &mut found);
        Self::scan_captured(person_title_re(), text, EntityType::Person, 0.6, &mut found);

        for m in capitalized_span_re().find_iter(text) {
            if !Self::overlaps(&found, m.start(), m.end()) {
                found.push(ExtractedEntity {
                    surface_form: m.as_str().to_string(),
                    entity_type: EntityType::Generic,
                    start: m.start(),
                    end: m.end(),
                    confidence: 0.5,
                });
            }
        }

        found.sort_by_key(|e| e.start);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_money_percent_and_date() {
        let extractor = RuleBasedExtractor::new();
        let entities = extractor
            .extract("Revenue rose 12.5% to $4,500 on January 3rd, 2024.", "en")
            .await
            .unwrap();

        assert!(entities.iter().any(|e| e.entity_type == EntityType::Percentage));
        assert!(entities.iter().any(|e| e.entity_type == EntityType::MonetaryValue));
        assert!(entities.iter().any(|e| e.entity_type == EntityType::Date));
    }

    #[tokio::test]
    async fn capitalized_spans_fall_back_to_generic() {
        let extractor = RuleBasedExtractor::new();
        let entities = extractor.extract("Redline met with John Smith yesterday.", "en").await.unwrap();
        assert!(entities.iter().any(|e| e.surface_form == "Redline" && e.entity_type == EntityType::Generic));
        assert!(entities.iter().any(|e| e.surface_form == "John Smith" && e.entity_type == EntityType::Generic));
    }

    #[tokio::test]
    async fn legal_suffix_span_recognized_as_organization() {
        let extractor = RuleBasedExtractor::new();
        let entities = extractor.extract("Jane Doe signed with Acme Corp last week.", "en").await.unwrap();
        assert!(entities.iter().any(|e| e.surface_form == "Acme Corp" && e.entity_type == EntityType::Organization));
    }

    #[tokio::test]
    async fn prepositional_span_recognized_as_location() {
        let extractor = RuleBasedExtractor::new();
        let entities = extractor.extract("The team relocated to the office in Boston this spring.", "en").await.unwrap();
        assert!(entities.iter().any(|e| e.surface_form == "Boston" && e.entity_type == EntityType::Location));
    }

    #[tokio::test]
    async fn titled_name_recognized_as_person() {
        let extractor = RuleBasedExtractor::new();
        let entities = extractor.extract("Dr. Jane Ostrin presented the findings.", "en").await.unwrap();
        assert!(entities.iter().any(|e| e.surface_form == "Jane Ostrin" && e.entity_type == EntityType::Person));
    }

    #[tokio::test]
    async fn typed_entity_pair_enables_non_generic_relation() {
        use memoria_models::infer_relation;

        let extractor = RuleBasedExtractor::new();
        let entities = extractor
            .extract("Dr. Jane Ostrin works at Acme Corp, based in Boston.", "en")
            .await
            .unwrap();

        let person = entities.iter().find(|e| e.entity_type == EntityType::Person).expect("person");
        let org = entities.iter().find(|e| e.entity_type == EntityType::Organization).expect("organization");
        let location = entities.iter().find(|e| e.entity_type == EntityType::Location).expect("location");

        let (rel, _) = infer_relation(person.entity_type, org.entity_type);
        assert_eq!(rel, memoria_models::EntityRelationType::WorksFor);
        let (rel, _) = infer_relation(org.entity_type, location.entity_type);
        assert_eq!(rel, memoria_models::EntityRelationType::BasedIn);
    }

    #[tokio::test]
    async fn empty_text_yields_no_entities() {
        let extractor = RuleBasedExtractor::new();
        let entities = extractor.extract("", "en").await.unwrap();
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn specific_rules_take_priority_over_capitalized_span() {
        let extractor = RuleBasedExtractor::new();
        // "January" alone would match the capitalized-span rule; the date rule should claim it first.
        let entities = extractor.extract("Filed on January 3rd, 2024 per the report.", "en").await.unwrap();
        let date_matches: Vec<_> = entities.iter().filter(|e| e.entity_type == EntityType::Date).collect();
        assert_eq!(date_matches.len(), 1);
    }
}
