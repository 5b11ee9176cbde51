use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::mindguard::database::{decode_error, parse_timestamp, Database, DatabaseError};
use crate::mindguard::messages::{Message, NewMessage};
use crate::mindguard::types::{MessageId, UserId};

/// Raw row from the `messages` table.
#[derive(Debug, Clone)]
pub(crate) struct MessageRow {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl<'r, R> sqlx::FromRow<'r, R> for MessageRow
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    bool: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> std::result::Result<Self, sqlx::Error> {
        let id_text: String = row.try_get("id")?;
        let id = MessageId::from_str(&id_text).map_err(|e| decode_error("id", e))?;

        let sender_text: String = row.try_get("sender_id")?;
        let sender_id = UserId::from_str(&sender_text).map_err(|e| decode_error("sender_id", e))?;

        let receiver_text: String = row.try_get("receiver_id")?;
        let receiver_id =
            UserId::from_str(&receiver_text).map_err(|e| decode_error("receiver_id", e))?;

        let content: String = row.try_get("content")?;
        let read: bool = row.try_get("read")?;
        let created_at = parse_timestamp(row, "created_at")?;

        Ok(Self {
            id,
            sender_id,
            receiver_id,
            content,
            read,
            created_at,
        })
    }
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

impl Message {
    /// Appends one message to the log, assigning its id and timestamp.
    pub(crate) async fn insert(
        new_message: &NewMessage,
        database: &Database,
    ) -> Result<Message, DatabaseError> {
        // The column stores millisecond precision; align the returned value
        // so a re-read compares equal.
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        let message = Message {
            id: MessageId::new(),
            sender_id: new_message.sender_id,
            receiver_id: new_message.receiver_id,
            content: new_message.content.clone(),
            read: false,
            created_at,
        };

        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, content, read, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.sender_id.to_string())
        .bind(message.receiver_id.to_string())
        .bind(message.content.as_str())
        .bind(message.read)
        .bind(message.created_at.timestamp_millis())
        .execute(&database.pool)
        .await?;

        Ok(message)
    }

    /// Every message `user` sent or received. No ordering guarantee; the
    /// aggregation pass sorts.
    pub(crate) async fn find_involving(
        user: UserId,
        database: &Database,
    ) -> Result<Vec<Message>, DatabaseError> {
        let rows: Vec<MessageRow> =
            sqlx::query_as("SELECT * FROM messages WHERE sender_id = ? OR receiver_id = ?")
                .bind(user.to_string())
                .bind(user.to_string())
                .fetch_all(&database.pool)
                .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    /// Both directions of the sub-log between `a` and `b`.
    pub(crate) async fn find_between(
        a: UserId,
        b: UserId,
        database: &Database,
    ) -> Result<Vec<Message>, DatabaseError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM messages WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)",
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .bind(b.to_string())
        .bind(a.to_string())
        .fetch_all(&database.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    /// Flips the read flag on every `sender` to `receiver` message whose
    /// flag differs. Returns how many rows changed.
    pub(crate) async fn set_read_state(
        sender: UserId,
        receiver: UserId,
        read: bool,
        database: &Database,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE messages SET read = ? WHERE sender_id = ? AND receiver_id = ? AND read <> ?",
        )
        .bind(read)
        .bind(sender.to_string())
        .bind(receiver.to_string())
        .bind(read)
        .execute(&database.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Whether any message exists between `a` and `b`, in either direction.
    pub(crate) async fn exists_between(
        a: UserId,
        b: UserId,
        database: &Database,
    ) -> Result<bool, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)",
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .bind(b.to_string())
        .bind(a.to_string())
        .fetch_one(&database.pool)
        .await?;

        Ok(count > 0)
    }
}
