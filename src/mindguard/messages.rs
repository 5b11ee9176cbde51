use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mindguard::types::{MessageId, UserId};

/// A single directed message from the append-only log.
///
/// Immutable once written except for the `read` flag, which only ever
/// moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The participant that is not `viewer`.
    pub fn counterpart_of(&self, viewer: UserId) -> UserId {
        if self.sender_id == viewer {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    /// True when the message is addressed to `viewer` and still unread.
    pub fn unread_for(&self, viewer: UserId) -> bool {
        self.receiver_id == viewer && !self.read
    }

    /// Total order over the log: timestamp first, id as tie-break.
    pub fn ordering_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }
}

/// Rejections raised before a message reaches any store.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message content is empty")]
    EmptyContent,

    #[error("sender and receiver are the same user")]
    SelfAddressed,
}

/// A message that has not been persisted yet. The store assigns the id,
/// timestamp, and the initial unread flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

impl NewMessage {
    pub fn new(sender_id: UserId, receiver_id: UserId, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            content: content.into(),
        }
    }

    /// Rejects blank content and self-addressed messages.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if self.sender_id == self.receiver_id {
            return Err(ValidationError::SelfAddressed);
        }
        Ok(())
    }
}
