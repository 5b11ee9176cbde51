//! Per-session conversation state: aggregation, read-state transitions,
//! and conversation initiation for one signed-in user.

mod aggregator;
mod initiate;
mod read_state;
mod types;


pub use types::{Conversation, EngineConfig, LastMessage};

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use crate::mindguard::error::Result;
use crate::mindguard::messages::Message;
use crate::mindguard::profiles::Profile;
use crate::mindguard::store::{MessageFilter, MessageStore, UserDirectory};
use crate::mindguard::types::UserId;

/// Conversation state for one session user.
///
/// Every operation takes `&mut self` and runs to completion before the
/// next one starts; a session never interleaves state changes. The cached
/// aggregate is the last successfully derived view and is only replaced
/// after a successful read of the log, so a failing store leaves callers
/// with a stale but internally consistent list.
pub struct ConversationEngine {
    viewer: UserId,
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    config: EngineConfig,
    conversations: HashMap<UserId, Conversation>,
}

impl ConversationEngine {
    pub fn new(
        viewer: UserId,
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self::with_config(viewer, store, directory, EngineConfig::default())
    }

    pub fn with_config(
        viewer: UserId,
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            viewer,
            store,
            directory,
            config,
            conversations: HashMap::new(),
        }
    }

    pub fn viewer(&self) -> UserId {
        self.viewer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Re-derives the conversation list from the full message log.
    ///
    /// On failure the cached aggregate stays untouched and the error
    /// propagates; callers keep showing the previous list.
    pub async fn refresh(&mut self) -> Result<()> {
        let messages = self
            .store
            .query_messages(MessageFilter::involving(self.viewer))
            .await?;
        let profiles = self.fetch_counterpart_profiles(&messages).await;

        self.conversations =
            aggregator::aggregate_conversations(messages, self.viewer, &profiles, &self.config);
        Ok(())
    }

    /// The cached conversation list, most recent activity first.
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut items: Vec<Conversation> = self.conversations.values().cloned().collect();
        sort_by_activity(&mut items);
        items
    }

    /// Conversations whose counterpart name or email contains `term`.
    /// A blank term returns the full list.
    pub fn filter_conversations(&self, term: &str) -> Vec<Conversation> {
        let term = term.trim();
        if term.is_empty() {
            return self.conversations();
        }

        let mut items: Vec<Conversation> = self
            .conversations
            .values()
            .filter(|conversation| conversation.matches_filter(term))
            .cloned()
            .collect();
        sort_by_activity(&mut items);
        items
    }

    /// The cached conversation with `counterpart`, if any.
    pub fn conversation(&self, counterpart: UserId) -> Option<&Conversation> {
        self.conversations.get(&counterpart)
    }

    /// Resolves every counterpart appearing in `messages`, one directory
    /// lookup per distinct user. Failed lookups degrade to the placeholder
    /// name instead of failing the aggregation.
    async fn fetch_counterpart_profiles(
        &self,
        messages: &[Message],
    ) -> HashMap<UserId, Profile> {
        let mut ids: Vec<UserId> = messages
            .iter()
            .map(|message| message.counterpart_of(self.viewer))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let directory = &self.directory;
        let lookups = ids
            .into_iter()
            .map(|id| async move { (id, directory.lookup_profile(id).await) });

        let mut profiles = HashMap::new();
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(profile) => {
                    profiles.insert(id, profile);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "mindguard::conversations",
                        "Failed to resolve profile for {}: {}",
                        id,
                        e
                    );
                }
            }
        }
        profiles
    }
}

/// Most recent activity first; ties fall back to counterpart id so the
/// order is stable across runs.
fn sort_by_activity(items: &mut [Conversation]) {
    items.sort_by(|a, b| {
        b.last_message
            .sent_at
            .cmp(&a.last_message.sent_at)
            .then_with(|| a.counterpart_id.cmp(&b.counterpart_id))
    });
}
