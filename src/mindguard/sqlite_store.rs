use std::sync::Arc;

use async_trait::async_trait;

use crate::mindguard::database::{Database, DatabaseError};
use crate::mindguard::messages::{Message, NewMessage};
use crate::mindguard::profiles::Profile;
use crate::mindguard::store::{MessageFilter, MessageStore, StoreError, UserDirectory};
use crate::mindguard::types::UserId;

/// Collaborator implementation backed by the embedded SQLite database.
///
/// One instance serves both as [`MessageStore`] and [`UserDirectory`];
/// sessions share it through an `Arc`.
pub struct SqliteStore {
    database: Arc<Database>,
}

impl SqliteStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Writes a directory entry. Profile maintenance sits outside the
    /// collaborator traits; it belongs to the surrounding application.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        Profile::upsert(profile, &self.database)
            .await
            .map_err(store_error)
    }
}

/// Database failures seen through a collaborator are retryable by
/// definition; validation never reaches SQL.
fn store_error(err: DatabaseError) -> StoreError {
    match err {
        DatabaseError::Sqlx(sqlx::Error::RowNotFound) => StoreError::NotFound,
        other => StoreError::Transient(other.to_string()),
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn query_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, StoreError> {
        let result = match filter.with {
            Some(counterpart) => {
                Message::find_between(filter.involving, counterpart, &self.database).await
            }
            None => Message::find_involving(filter.involving, &self.database).await,
        };
        result.map_err(store_error)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        message.validate()?;
        Message::insert(&message, &self.database)
            .await
            .map_err(store_error)
    }

    async fn update_read_state(
        &self,
        sender: UserId,
        receiver: UserId,
        read: bool,
    ) -> Result<u64, StoreError> {
        let affected = Message::set_read_state(sender, receiver, read, &self.database)
            .await
            .map_err(store_error)?;

        if affected == 0 {
            let pair_exists = Message::exists_between(sender, receiver, &self.database)
                .await
                .map_err(store_error)?;
            if !pair_exists {
                return Err(StoreError::NotFound);
            }
        }

        Ok(affected)
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn search_users(
        &self,
        query: &str,
        exclude: UserId,
        limit: usize,
    ) -> Result<Vec<Profile>, StoreError> {
        Profile::search(query, exclude, limit, &self.database)
            .await
            .map_err(store_error)
    }

    async fn lookup_profile(&self, user: UserId) -> Result<Profile, StoreError> {
        Profile::find_by_id(user, &self.database)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound)
    }
}
