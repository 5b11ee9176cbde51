use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::mindguard::messages::{Message, NewMessage, ValidationError};
use crate::mindguard::profiles::Profile;
use crate::mindguard::types::{MessageId, UserId};

/// Failures surfaced by collaborator operations.
///
/// `Validation` is permanent for the given input. `Transient` is retryable
/// and must leave the caller's derived state untouched. `NotFound` signals
/// that a targeted update had nothing to act on.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("store unavailable: {0}")]
    Transient(String),

    #[error("no matching rows")]
    NotFound,
}

/// Selects messages for [`MessageStore::query_messages`].
///
/// `involving(user)` matches every message the user sent or received;
/// chaining `.with(counterpart)` narrows that to the pair's sub-log.
/// Results carry no ordering guarantee; callers sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFilter {
    pub involving: UserId,
    pub with: Option<UserId>,
}

impl MessageFilter {
    pub fn involving(user: UserId) -> Self {
        Self {
            involving: user,
            with: None,
        }
    }

    pub fn with(mut self, counterpart: UserId) -> Self {
        self.with = Some(counterpart);
        self
    }

    /// Whether `message` falls inside this filter.
    pub fn matches(&self, message: &Message) -> bool {
        let involves =
            message.sender_id == self.involving || message.receiver_id == self.involving;
        match self.with {
            Some(other) => {
                involves && (message.sender_id == other || message.receiver_id == other)
            }
            None => involves,
        }
    }
}

/// Append-only log of directed messages.
///
/// Inserts and read-flag updates are the only writes; nothing is ever
/// deleted through this trait.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns all messages matching `filter`, in no particular order.
    async fn query_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, StoreError>;

    /// Persists one message, assigning its id, timestamp, and an unread
    /// flag. Fails with [`StoreError::Validation`] for blank content or a
    /// self-addressed message.
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Sets the read flag on every message from `sender` to `receiver`
    /// whose flag currently differs. Returns the number of rows changed,
    /// or [`StoreError::NotFound`] when the pair has no messages at all.
    async fn update_read_state(
        &self,
        sender: UserId,
        receiver: UserId,
        read: bool,
    ) -> Result<u64, StoreError>;
}

/// Lookup and free-text search over user identities.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Case-insensitive substring search over names and emails. `exclude`
    /// (normally the searching user) never appears in the results.
    async fn search_users(
        &self,
        query: &str,
        exclude: UserId,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError>;

    /// Resolves a single profile, [`StoreError::NotFound`] when absent.
    async fn lookup_profile(&self, user: UserId) -> Result<Profile, StoreError>;
}

/// In-memory collaborator for tests and lightweight embedders.
///
/// Implements both [`MessageStore`] and [`UserDirectory`] over a flat
/// message list and a profile map. `set_offline` makes every operation
/// fail with [`StoreError::Transient`] to exercise degraded paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    offline: AtomicBool,
}

#[derive(Default)]
struct MemoryInner {
    messages: Vec<Message>,
    profiles: HashMap<UserId, Profile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Seeds a directory entry.
    pub async fn add_profile(&self, profile: Profile) {
        self.inner.lock().await.profiles.insert(profile.id, profile);
    }

    /// Appends a fully formed message, bypassing validation and timestamp
    /// assignment. Fixture helper for pre-populating histories.
    pub async fn push_raw(&self, message: Message) {
        self.inner.lock().await.messages.push(message);
    }

    pub async fn message_count(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Transient("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn query_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .iter()
            .filter(|message| filter.matches(message))
            .cloned()
            .collect())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        self.check_online()?;
        message.validate()?;

        let stored = Message {
            id: MessageId::new(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            read: false,
            created_at: Utc::now(),
        };
        self.inner.lock().await.messages.push(stored.clone());
        Ok(stored)
    }

    async fn update_read_state(
        &self,
        sender: UserId,
        receiver: UserId,
        read: bool,
    ) -> Result<u64, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;

        let mut affected = 0u64;
        for message in inner.messages.iter_mut() {
            if message.sender_id == sender && message.receiver_id == receiver && message.read != read
            {
                message.read = read;
                affected += 1;
            }
        }

        if affected == 0 {
            let pair_exists = inner.messages.iter().any(|message| {
                (message.sender_id == sender && message.receiver_id == receiver)
                    || (message.sender_id == receiver && message.receiver_id == sender)
            });
            if !pair_exists {
                return Err(StoreError::NotFound);
            }
        }

        Ok(affected)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn search_users(
        &self,
        query: &str,
        exclude: UserId,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        self.check_online()?;
        let needle = query.to_lowercase();
        let inner = self.inner.lock().await;

        let mut hits: Vec<Profile> = inner
            .profiles
            .values()
            .filter(|profile| profile.id != exclude)
            .filter(|profile| {
                let name_hit = profile
                    .full_name
                    .as_deref()
                    .map(|name| name.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                name_hit || profile.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        // Deterministic order for callers and tests.
        hits.sort_by(|a, b| a.email.cmp(&b.email));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn lookup_profile(&self, user: UserId) -> Result<Profile, StoreError> {
        self.check_online()?;
        self.inner
            .lock()
            .await
            .profiles
            .get(&user)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn uid(n: u128) -> UserId {
        UserId::from(Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn test_filter_involving_matches_both_directions() {
        let store = MemoryStore::new();
        store
            .insert_message(NewMessage::new(uid(1), uid(2), "out"))
            .await
            .unwrap();
        store
            .insert_message(NewMessage::new(uid(2), uid(1), "in"))
            .await
            .unwrap();
        store
            .insert_message(NewMessage::new(uid(2), uid(3), "elsewhere"))
            .await
            .unwrap();

        let mine = store
            .query_messages(MessageFilter::involving(uid(1)))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
    }

    #[tokio::test]
    async fn test_filter_with_narrows_to_the_pair() {
        let store = MemoryStore::new();
        store
            .insert_message(NewMessage::new(uid(1), uid(2), "pair"))
            .await
            .unwrap();
        store
            .insert_message(NewMessage::new(uid(1), uid(3), "other pair"))
            .await
            .unwrap();

        let pair = store
            .query_messages(MessageFilter::involving(uid(1)).with(uid(2)))
            .await
            .unwrap();
        assert_eq!(pair.len(), 1);
        assert_eq!(pair[0].content, "pair");
    }

    #[tokio::test]
    async fn test_insert_validates_before_storing() {
        let store = MemoryStore::new();

        let result = store
            .insert_message(NewMessage::new(uid(1), uid(2), "   "))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::Validation(ValidationError::EmptyContent))
        ));
        assert_eq!(store.message_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_read_state_counts_only_changed_rows() {
        let store = MemoryStore::new();
        store
            .insert_message(NewMessage::new(uid(2), uid(1), "one"))
            .await
            .unwrap();
        store
            .insert_message(NewMessage::new(uid(2), uid(1), "two"))
            .await
            .unwrap();

        let first = store.update_read_state(uid(2), uid(1), true).await.unwrap();
        assert_eq!(first, 2);

        // Second pass touches nothing.
        let second = store.update_read_state(uid(2), uid(1), true).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn test_update_read_state_not_found_for_unknown_pair() {
        let store = MemoryStore::new();
        store
            .insert_message(NewMessage::new(uid(1), uid(2), "hi"))
            .await
            .unwrap();

        let result = store.update_read_state(uid(3), uid(1), true).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_search_users_excludes_and_limits() {
        let store = MemoryStore::new();
        store
            .add_profile(Profile::new(uid(1), "me@example.com", Some("Searcher".into())))
            .await;
        for n in 2..8 {
            store
                .add_profile(Profile::new(
                    uid(n),
                    format!("match{n}@example.com"),
                    Some("Match".into()),
                ))
                .await;
        }

        let hits = store.search_users("match", uid(1), 4).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|p| p.id != uid(1)));

        let by_own_email = store.search_users("me@example", uid(1), 10).await.unwrap();
        assert!(by_own_email.is_empty());
    }

    #[tokio::test]
    async fn test_search_users_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .add_profile(Profile::new(
                uid(2),
                "Alice@Example.COM",
                Some("Alice Lidell".into()),
            ))
            .await;

        let hits = store.search_users("aLiCe", uid(1), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_fails_transiently() {
        let store = MemoryStore::new();
        store.set_offline(true);

        let result = store.query_messages(MessageFilter::involving(uid(1))).await;
        assert!(matches!(result, Err(StoreError::Transient(_))));

        store.set_offline(false);
        assert!(store
            .query_messages(MessageFilter::involving(uid(1)))
            .await
            .is_ok());
    }
}
