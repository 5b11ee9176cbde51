//! Starting conversations: directory search, first-contact deduplication,
//! and sends into existing threads.

use crate::mindguard::error::Result;
use crate::mindguard::messages::{Message, NewMessage};
use crate::mindguard::profiles::Profile;
use crate::mindguard::store::StoreError;
use crate::mindguard::types::UserId;

use super::types::LastMessage;
use super::{aggregator, Conversation, ConversationEngine};

impl ConversationEngine {
    /// Free-text directory search for new conversation partners.
    ///
    /// Trimmed queries shorter than the configured minimum return no
    /// candidates without touching the directory. The session user never
    /// appears in the results.
    pub async fn search_directory(&self, query: &str) -> Result<Vec<Profile>> {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.config.min_query_length {
            return Ok(Vec::new());
        }

        let hits = self
            .directory
            .search_users(trimmed, self.viewer, self.config.directory_result_limit)
            .await?;
        Ok(hits)
    }

    /// Selects the conversation with `counterpart`, creating it with an
    /// opening message when no history exists yet.
    ///
    /// Returns the conversation and whether it was newly created. An
    /// existing conversation is returned as-is; no second opening message
    /// is ever written for it. Two racing first calls can still both
    /// insert, in which case the next aggregation collapses the two
    /// messages into the same single conversation.
    pub async fn start_conversation(
        &mut self,
        counterpart: UserId,
        opening: Option<&str>,
    ) -> Result<(Conversation, bool)> {
        if let Some(existing) = self.conversations.get(&counterpart) {
            return Ok((existing.clone(), false));
        }

        // Blank opening text falls back to the default greeting.
        let content = match opening.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => text.to_string(),
            None => self.config.default_greeting.clone(),
        };

        let new_message = NewMessage::new(self.viewer, counterpart, content);
        new_message.validate()?;
        let message = self.store.insert_message(new_message).await?;

        let profile = self.resolve_profile(counterpart).await;
        let conversation = aggregator::seed_conversation(counterpart, &message, profile.as_ref());
        self.conversations.insert(counterpart, conversation.clone());

        tracing::debug!(
            target: "mindguard::conversations",
            "Started conversation between {} and {}",
            self.viewer,
            counterpart
        );

        Ok((conversation, true))
    }

    /// Appends a message to the thread with `counterpart` and updates the
    /// cached preview.
    pub async fn send_message(&mut self, counterpart: UserId, content: &str) -> Result<Message> {
        let new_message = NewMessage::new(self.viewer, counterpart, content.trim());
        new_message.validate()?;
        let message = self.store.insert_message(new_message).await?;

        match self.conversations.get_mut(&counterpart) {
            Some(conversation) => {
                conversation.last_message = LastMessage {
                    id: message.id,
                    content: message.content.clone(),
                    sent_at: message.created_at,
                };
            }
            None => {
                // First contact through a plain send; seed the cache so the
                // conversation shows up without waiting for a refresh.
                let profile = self.resolve_profile(counterpart).await;
                let conversation =
                    aggregator::seed_conversation(counterpart, &message, profile.as_ref());
                self.conversations.insert(counterpart, conversation);
            }
        }

        Ok(message)
    }

    /// Directory lookup that degrades to `None` instead of failing the
    /// surrounding operation.
    async fn resolve_profile(&self, counterpart: UserId) -> Option<Profile> {
        match self.directory.lookup_profile(counterpart).await {
            Ok(profile) => Some(profile),
            Err(StoreError::NotFound) => None,
            Err(e) => {
                tracing::warn!(
                    target: "mindguard::conversations",
                    "Profile lookup failed for {}: {}",
                    counterpart,
                    e
                );
                None
            }
        }
    }
}
