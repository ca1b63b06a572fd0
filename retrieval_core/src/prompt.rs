//! Session-aware prompt composer. Assembles a bounded set of labeled sections
//! from the aggregated context, the running conversation, and fresh
//! transcripts, trimming to just the incremental delta on later turns in the
//! same session.
//!
//! Section-content grounded in
//! `original_source/backend/services/intelligent_prompt_builder.py`: the role
//! line, response framework, and anti-hallucination clauses are static
//! template text parameterized only by a persona name, and the per-source
//! grouping in section (C) suffixes the confidence badge onto the item's
//! first line rather than prefixing it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::ranker::RankedResult;
use memoria_models::{ConversationSession, ResultType};

/// A transcript segment newer than the session's retrieval cutoff, candidate
/// for section (B) pending the delivered-fingerprint filter.
#[derive(Debug, Clone)]
pub struct RecentTranscript {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub struct ComposedPrompt {
    pub text: String,
    /// Section labels actually included, in catalog order, for observability.
    pub sections_included: Vec<&'static str>,
    /// Fingerprints of section (B) transcripts emitted this turn. The caller
    /// MUST record these via `session.mark_fingerprint_delivered` in the same
    /// transaction as the session's history update (§5 ordering guarantee).
    pub new_fingerprints: Vec<String>,
}

/// First 50 characters of a transcript, used as its stable delivery key.
pub fn transcript_fingerprint(content: &str) -> String {
    content.chars().take(50).collect()
}

fn confidence_badge(score: f64) -> &'static str {
    if score >= 0.8 {
        "HIGH"
    } else if score >= 0.6 {
        "MODERATE"
    } else if score >= 0.4 {
        "LOW"
    } else {
        "VERY LOW"
    }
}

fn result_type_label(t: ResultType) -> &'static str {
    match t {
        ResultType::Chunk => "Chunks",
        ResultType::Entity => "Entities",
        ResultType::Relationship => "Relationships",
        ResultType::Document => "Documents",
        ResultType::Mixed => "Mixed",
    }
}

pub struct PromptComposer {
    persona_name: String,
}

impl PromptComposer {
    pub fn new(persona_name: impl Into<String>) -> Self {
        Self { persona_name: persona_name.into() }
    }

    /// (A) Static role line, parameterized only by persona name.
    fn section_role(&self) -> Option<String> {
        if self.persona_name.trim().is_empty() {
            tracing::warn!("persona name missing, dropping role section");
            return None;
        }
        Some(format!(
            "You are {}, an assistant with access to the user's personal knowledge base. Answer using the context supplied below, and say when you don't know.",
            self.persona_name
        ))
    }

    /// (B) Transcripts newer than the cutoff not already delivered to this session.
    fn section_recent_transcripts(&self, recent: &[RecentTranscript], session: &ConversationSession) -> (Option<String>, Vec<String>) {
        let mut fresh = Vec::new();
        let mut fingerprints = Vec::new();
        for t in recent {
            let fp = transcript_fingerprint(&t.content);
            if session.delivered_fingerprints.contains(&fp) {
                continue;
            }
            fresh.push(t.content.clone());
            fingerprints.push(fp);
        }
        if fresh.is_empty() {
            return (None, Vec::new());
        }
        let body = fresh.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n");
        (Some(format!("Recent transcripts:\n{body}")), fingerprints)
    }

    /// (C) Retrieval context grouped by result type, each group ordered by
    /// unified score descending, with a `[BADGE]` suffix on the item's first line.
    fn section_retrieval_context(&self, results: &[RankedResult]) -> Option<String> {
        if results.is_empty() {
            return None;
        }

        let groups = [ResultType::Chunk, ResultType::Entity, ResultType::Relationship, ResultType::Document, ResultType::Mixed];
        let mut blocks = Vec::new();

        for group in groups {
            let mut items: Vec<&RankedResult> = results.iter().filter(|r| r.result.result_type == group).collect();
            if items.is_empty() {
                continue;
            }
            items.sort_by(|a, b| b.unified_score.partial_cmp(&a.unified_score).unwrap_or(std::cmp::Ordering::Equal));

            let lines: Vec<String> = items
                .iter()
                .map(|r| {
                    let first_line = r.result.content.lines().next().unwrap_or("").trim();
                    let badge = confidence_badge(r.unified_score);
                    format!("- {first_line} [{badge}]")
                })
                .collect();

            blocks.push(format!("{}:\n{}", result_type_label(group), lines.join("\n")));
        }

        Some(format!("Retrieved context:\n{}", blocks.join("\n\n")))
    }

    /// (D) Plugin outputs, rendered as a bullet list keyed by plugin name.
    fn section_plugin_outputs(&self, plugin_outputs: &HashMap<String, String>) -> Option<String> {
        if plugin_outputs.is_empty() {
            return None;
        }
        let mut keys: Vec<&String> = plugin_outputs.keys().collect();
        keys.sort();
        let body = keys.iter().map(|k| format!("- {k}: {}", plugin_outputs[*k])).collect::<Vec<_>>().join("\n");
        Some(format!("Plugin outputs:\n{body}"))
    }

    /// (E) Last 3 turns of conversation history, assistant utterances truncated to ~200 chars.
    fn section_history(&self, session: &ConversationSession) -> Option<String> {
        if session.history.is_empty() {
            return None;
        }
        let turns: Vec<String> = session
            .history
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|ex| {
                let truncated: String = if ex.assistant_utterance.chars().count() > 200 {
                    let mut s: String = ex.assistant_utterance.chars().take(197).collect();
                    s.push_str("...");
                    s
                } else {
                    ex.assistant_utterance.clone()
                };
                format!("User: {}\nAssistant: {truncated}", ex.user_utterance)
            })
            .collect();
        Some(format!("Conversation history:\n{}", turns.join("\n\n")))
    }

    /// (F) Task instructions. Full framing on first turn, just the raw message on continuation.
    fn section_task(&self, user_message: &str, first_turn: bool) -> Option<String> {
        if user_message.trim().is_empty() {
            tracing::warn!("empty user message, dropping task section");
            return None;
        }
        if first_turn {
            Some(format!("Using the context above, answer the user's request:\n\"{user_message}\""))
        } else {
            Some(user_message.to_string())
        }
    }

    /// (G) Static response framework: citation and structure guidance.
    fn section_response_framework(&self) -> Option<String> {
        if self.persona_name.trim().is_empty() {
            return None;
        }
        Some(
            "When you use retrieved context, cite it by its source tag in parentheses. \
             Structure longer answers with a short direct answer first, then supporting detail."
                .to_string(),
        )
    }

    /// (H) Static anti-hallucination clause.
    fn section_quality(&self) -> Option<String> {
        if self.persona_name.trim().is_empty() {
            return None;
        }
        Some(
            "Only state facts supported by the retrieved context or the conversation history. \
             If the context does not cover the question, say so instead of guessing."
                .to_string(),
        )
    }

    fn fallback_prompt(&self, user_message: &str, results: &[RankedResult]) -> String {
        let role = self.persona_name.trim();
        let role_line = if role.is_empty() {
            "You are an assistant with access to the user's personal knowledge base.".to_string()
        } else {
            format!("You are {role}, an assistant with access to the user's personal knowledge base.")
        };
        let bullets: Vec<String> = results.iter().take(5).map(|r| format!("- {}", r.result.content.lines().next().unwrap_or(""))).collect();
        format!("{role_line}\n\nAvailable context:\n{}\n\nUser: {user_message}", bullets.join("\n"))
    }

    /// Compose the prompt for one turn. `session` is read, not mutated -- the
    /// caller commits `new_fingerprints` and the new exchange together.
    #[tracing::instrument(skip(self, results, plugin_outputs, recent_transcripts))]
    pub fn compose(
        &self,
        user_message: &str,
        results: &[RankedResult],
        plugin_outputs: &HashMap<String, String>,
        session: &ConversationSession,
        recent_transcripts: &[RecentTranscript],
    ) -> ComposedPrompt {
        let first_turn = session.is_first_turn();
        let (section_b, new_fingerprints) = self.section_recent_transcripts(recent_transcripts, session);

        let mut parts: Vec<(&'static str, Option<String>)> = Vec::new();
        if first_turn {
            parts.push(("A", self.section_role()));
        }
        parts.push(("B", section_b));
        parts.push(("C", self.section_retrieval_context(results)));
        parts.push(("D", self.section_plugin_outputs(plugin_outputs)));
        parts.push(("E", self.section_history(session)));
        parts.push(("F", self.section_task(user_message, first_turn)));
        if first_turn {
            parts.push(("G", self.section_response_framework()));
            parts.push(("H", self.section_quality()));
        }

        let included: Vec<(&'static str, String)> = parts.into_iter().filter_map(|(label, body)| body.map(|b| (label, b))).collect();

        let critical_missing = !included.iter().any(|(label, _)| *label == "F") && !included.iter().any(|(label, _)| *label == "C");
        if critical_missing {
            tracing::warn!("both context and task sections failed to compose, falling back to minimal prompt");
            return ComposedPrompt {
                text: self.fallback_prompt(user_message, results),
                sections_included: vec!["fallback"],
                new_fingerprints,
            };
        }

        let text = included.iter().map(|(_, body)| body.clone()).collect::<Vec<_>>().join("\n\n");
        let sections_included = included.iter().map(|(label, _)| *label).collect();

        ComposedPrompt { text, sections_included, new_fingerprints }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_models::{RetrievalResult, ResultType as RT};
    use uuid::Uuid;

    fn ranked(content: &str, score: f64, result_type: RT) -> RankedResult {
        let mut r = RetrievalResult::new(Uuid::new_v4().to_string(), result_type, content, "chromadb.chunks");
        r.score = score;
        crate::ranker::Ranker::new(memoria_config::RankingWeights::default()).rank(vec![r], "query", &crate::ranker::RankingPreset::default()).remove(0)
    }

    #[test]
    fn first_turn_includes_static_sections() {
        let composer = PromptComposer::new("Atlas");
        let session = ConversationSession::new(Uuid::new_v4());
        let results = vec![ranked("hello world", 0.9, RT::Chunk)];
        let composed = composer.compose("what happened?", &results, &HashMap::new(), &session, &[]);
        assert!(composed.sections_included.contains(&"A"));
        assert!(composed.sections_included.contains(&"G"));
        assert!(composed.sections_included.contains(&"H"));
    }

    #[test]
    fn continuation_omits_static_sections() {
        let composer = PromptComposer::new("Atlas");
        let mut session = ConversationSession::new(Uuid::new_v4());
        session.push_exchange("hi".into(), "hello".into());
        let results = vec![ranked("hello world", 0.9, RT::Chunk)];
        let composed = composer.compose("follow up question", &results, &HashMap::new(), &session, &[]);
        assert!(!composed.sections_included.contains(&"A"));
        assert!(!composed.sections_included.contains(&"G"));
        assert!(!composed.sections_included.contains(&"H"));
        assert!(composed.sections_included.contains(&"F"));
    }

    #[test]
    fn transcript_fingerprint_filter_drops_already_delivered() {
        let composer = PromptComposer::new("Atlas");
        let mut session = ConversationSession::new(Uuid::new_v4());
        let t1 = RecentTranscript { content: "the quarterly report landed this morning".into(), created_at: Utc::now() };
        let fp = transcript_fingerprint(&t1.content);
        session.mark_fingerprint_delivered(fp);

        let composed = composer.compose("anything new?", &[], &HashMap::new(), &session, &[t1]);
        assert!(composed.new_fingerprints.is_empty());
        assert!(!composed.sections_included.contains(&"B"));
    }

    #[test]
    fn confidence_badge_thresholds() {
        assert_eq!(confidence_badge(0.95), "HIGH");
        assert_eq!(confidence_badge(0.65), "MODERATE");
        assert_eq!(confidence_badge(0.45), "LOW");
        assert_eq!(confidence_badge(0.1), "VERY LOW");
    }

    #[test]
    fn missing_persona_falls_back_to_minimal_prompt_when_context_and_task_absent() {
        let composer = PromptComposer::new("");
        let session = ConversationSession::new(Uuid::new_v4());
        let composed = composer.compose("", &[], &HashMap::new(), &session, &[]);
        assert_eq!(composed.sections_included, vec!["fallback"]);
    }
}
