use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mindguard::types::{MessageId, UserId};

/// Preview of the newest message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub id: MessageId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// Summary of everything exchanged between the session user and one
/// counterpart.
///
/// Derived from the message log on every aggregation pass and never
/// persisted; a conversation exists purely because messages do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub counterpart_id: UserId,
    /// Resolved name: full name, then email, then a placeholder.
    pub counterpart_name: String,
    /// Absent when the directory has no entry for the counterpart.
    pub counterpart_email: Option<String>,
    pub last_message: LastMessage,
    /// Messages addressed to the session user that are still unread.
    pub unread_count: u64,
}

impl Conversation {
    /// Case-insensitive substring match on the counterpart's name or email.
    pub fn matches_filter(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        if self.counterpart_name.to_lowercase().contains(&needle) {
            return true;
        }
        self.counterpart_email
            .as_deref()
            .map(|email| email.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }
}

/// Tunables for a [`ConversationEngine`](super::ConversationEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Opening text used when a conversation is started without one.
    pub default_greeting: String,
    /// Maximum number of candidates a directory search returns.
    pub directory_result_limit: usize,
    /// Trimmed queries shorter than this return no candidates.
    pub min_query_length: usize,
    /// Emit per-pass debug logs during aggregation.
    pub enable_debug_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_greeting: "Hi! I'd like to connect with you.".to_string(),
            directory_result_limit: 10,
            min_query_length: 3,
            enable_debug_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn conversation(name: &str, email: Option<&str>) -> Conversation {
        Conversation {
            counterpart_id: UserId::from(Uuid::from_u128(1)),
            counterpart_name: name.to_string(),
            counterpart_email: email.map(str::to_string),
            last_message: LastMessage {
                id: MessageId::from(Uuid::from_u128(1)),
                content: "hi".to_string(),
                sent_at: Utc::now(),
            },
            unread_count: 0,
        }
    }

    #[test]
    fn test_matches_filter_on_name_case_insensitive() {
        let convo = conversation("Alice Lidell", Some("alice@example.com"));
        assert!(convo.matches_filter("lidell"));
        assert!(convo.matches_filter("ALICE"));
        assert!(!convo.matches_filter("bob"));
    }

    #[test]
    fn test_matches_filter_on_email() {
        let convo = conversation("Unknown User", Some("alice@example.com"));
        assert!(convo.matches_filter("example.com"));
    }

    #[test]
    fn test_matches_filter_without_email() {
        let convo = conversation("Unknown User", None);
        assert!(convo.matches_filter("unknown"));
        assert!(!convo.matches_filter("example.com"));
    }

    #[test]
    fn test_default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.default_greeting, "Hi! I'd like to connect with you.");
        assert_eq!(config.directory_result_limit, 10);
        assert_eq!(config.min_query_length, 3);
        assert!(!config.enable_debug_logging);
    }
}
