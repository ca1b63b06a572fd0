//! A conversation session tracks exchange history and which transcript
//! fingerprints have already been delivered, so prompt composition can tell
//! a first turn from a continuation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

pub const DEFAULT_HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user_utterance: String,
    pub assistant_utterance: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub history: VecDeque<Exchange>,
    /// Transcript fingerprints already delivered to this session, in delivery order.
    pub delivered_fingerprints: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    history_limit: usize,
}

impl ConversationSession {
    pub fn new(user_id: Uuid) -> Self {
        Self::with_history_limit(user_id, DEFAULT_HISTORY_LEN)
    }

    pub fn with_history_limit(user_id: Uuid, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            history: VecDeque::new(),
            delivered_fingerprints: Vec::new(),
            created_at: now,
            updated_at: now,
            history_limit,
        }
    }

    /// Record an exchange, truncating history to the most recent N.
    pub fn push_exchange(&mut self, user_utterance: String, assistant_utterance: String) {
        self.history.push_back(Exchange {
            user_utterance,
            assistant_utterance,
            timestamp: Utc::now(),
        });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
        self.updated_at = Utc::now();
    }

    /// Whether this is the first query in the session (no exchanges delivered yet).
    pub fn is_first_turn(&self) -> bool {
        self.history.is_empty()
    }

    /// Record a delivered transcript fingerprint if not already present.
    /// Returns `true` if this is a newly delivered fingerprint.
    pub fn mark_fingerprint_delivered(&mut self, fingerprint: String) -> bool {
        if self.delivered_fingerprints.contains(&fingerprint) {
            return false;
        }
        self.delivered_fingerprints.push(fingerprint);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_truncates_to_limit() {
        let mut s = ConversationSession::with_history_limit(Uuid::new_v4(), 2);
        s.push_exchange("a".into(), "a!".into());
        s.push_exchange("b".into(), "b!".into());
        s.push_exchange("c".into(), "c!".into());
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.history.front().unwrap().user_utterance, "b");
    }

    #[test]
    fn fingerprint_delivered_only_once() {
        let mut s = ConversationSession::new(Uuid::new_v4());
        assert!(s.mark_fingerprint_delivered("abc".into()));
        assert!(!s.mark_fingerprint_delivered("abc".into()));
        assert_eq!(s.delivered_fingerprints.len(), 1);
    }

    #[test]
    fn first_turn_before_any_exchange() {
        let mut s = ConversationSession::new(Uuid::new_v4());
        assert!(s.is_first_turn());
        s.push_exchange("hi".into(), "hello".into());
        assert!(!s.is_first_turn());
    }
}
