//! Read-state transition that fires when a conversation is opened.

use crate::mindguard::error::Result;
use crate::mindguard::messages::Message;
use crate::mindguard::store::{MessageFilter, StoreError};
use crate::mindguard::types::UserId;

use super::{aggregator, ConversationEngine};

impl ConversationEngine {
    /// Opens the conversation with `counterpart`: returns the pair's
    /// thread oldest first and marks every message addressed to the
    /// session user as read.
    ///
    /// The cached unread count is refreshed from a re-read of the store
    /// rather than assumed to be zero, so a failed or partial write never
    /// hides messages that are still unread. Opening a counterpart with no
    /// history yields an empty thread and changes nothing.
    pub async fn open_conversation(&mut self, counterpart: UserId) -> Result<Vec<Message>> {
        let mut thread = self
            .store
            .query_messages(MessageFilter::involving(self.viewer).with(counterpart))
            .await?;
        aggregator::sort_oldest_first(&mut thread);

        if thread.is_empty() {
            return Ok(thread);
        }

        match self
            .store
            .update_read_state(counterpart, self.viewer, true)
            .await
        {
            Ok(marked) => {
                if marked > 0 {
                    tracing::debug!(
                        target: "mindguard::conversations",
                        "Marked {} messages from {} as read",
                        marked,
                        counterpart
                    );
                }
            }
            // Nothing between the pair to act on.
            Err(StoreError::NotFound) => return Ok(thread),
            Err(e) => return Err(e.into()),
        }

        let unread = self.recount_unread(counterpart).await?;
        if let Some(conversation) = self.conversations.get_mut(&counterpart) {
            conversation.unread_count = unread;
        }

        Ok(thread)
    }

    /// Ground-truth unread count for one counterpart, straight from the
    /// store.
    async fn recount_unread(&self, counterpart: UserId) -> Result<u64> {
        let sub_log = self
            .store
            .query_messages(MessageFilter::involving(self.viewer).with(counterpart))
            .await?;
        Ok(sub_log
            .iter()
            .filter(|message| message.unread_for(self.viewer))
            .count() as u64)
    }
}
