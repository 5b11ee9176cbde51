//! Pure aggregation pass over the message log.
//!
//! Folds a user's flat bidirectional log into one conversation per
//! counterpart. No I/O happens here; the engine fetches, this module
//! derives.

use std::collections::HashMap;

use crate::mindguard::messages::Message;
use crate::mindguard::profiles::{self, Profile};
use crate::mindguard::types::UserId;

use super::types::{Conversation, EngineConfig, LastMessage};

/// Derives one [`Conversation`] per counterpart of `viewer`.
///
/// Messages are processed newest first, so the first message seen for a
/// counterpart seeds `last_message`; the unread count accumulates over the
/// counterpart's entire sub-log. One linear pass after the sort, and the
/// same log always yields the same result.
pub(crate) fn aggregate_conversations(
    mut messages: Vec<Message>,
    viewer: UserId,
    profiles: &HashMap<UserId, Profile>,
    config: &EngineConfig,
) -> HashMap<UserId, Conversation> {
    if messages.is_empty() {
        return HashMap::new();
    }

    sort_newest_first(&mut messages);

    if config.enable_debug_logging {
        tracing::debug!(
            target: "mindguard::conversations::aggregator",
            "Aggregating {} messages for user {}",
            messages.len(),
            viewer
        );
    }

    let mut conversations: HashMap<UserId, Conversation> = HashMap::new();

    for message in &messages {
        let counterpart = message.counterpart_of(viewer);

        let conversation = conversations
            .entry(counterpart)
            .or_insert_with(|| seed_conversation(counterpart, message, profiles.get(&counterpart)));

        if message.unread_for(viewer) {
            conversation.unread_count += 1;
        }
    }

    if config.enable_debug_logging {
        tracing::debug!(
            target: "mindguard::conversations::aggregator",
            "Derived {} conversations for user {}",
            conversations.len(),
            viewer
        );
    }

    conversations
}

/// Sorts by `created_at` descending, equal timestamps by id ascending.
/// The tie-break keeps `last_message` seeding deterministic across runs.
pub(crate) fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Sorts into thread display order, oldest message first.
pub(crate) fn sort_oldest_first(messages: &mut [Message]) {
    messages.sort_by_key(Message::ordering_key);
}

/// Builds the conversation shell from the newest message of a counterpart.
/// The unread count starts at zero and accumulates during the pass.
pub(crate) fn seed_conversation(
    counterpart: UserId,
    newest: &Message,
    profile: Option<&Profile>,
) -> Conversation {
    Conversation {
        counterpart_id: counterpart,
        counterpart_name: profiles::resolve_display_name(profile),
        counterpart_email: profile.map(|p| p.email.clone()),
        last_message: LastMessage {
            id: newest.id,
            content: newest.content.clone(),
            sent_at: newest.created_at,
        },
        unread_count: 0,
    }
}
