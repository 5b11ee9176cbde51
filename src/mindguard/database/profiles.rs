use std::str::FromStr;

use chrono::Utc;

use crate::mindguard::database::{decode_error, Database, DatabaseError};
use crate::mindguard::profiles::Profile;
use crate::mindguard::types::UserId;

/// Raw row from the `profiles` table. The audit timestamps stay in SQL;
/// nothing downstream consumes them.
#[derive(Debug, Clone)]
pub(crate) struct ProfileRow {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
}

impl<'r, R> sqlx::FromRow<'r, R> for ProfileRow
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    Option<String>: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> std::result::Result<Self, sqlx::Error> {
        let id_text: String = row.try_get("id")?;
        let id = UserId::from_str(&id_text).map_err(|e| decode_error("id", e))?;

        let email: String = row.try_get("email")?;
        let full_name: Option<String> = row.try_get("full_name")?;

        Ok(Self {
            id,
            email,
            full_name,
        })
    }
}

impl ProfileRow {
    fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
        }
    }
}

/// Escapes LIKE metacharacters so user input matches literally. Patterns
/// built from the result must use `ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

impl Profile {
    pub(crate) async fn find_by_id(
        user: UserId,
        database: &Database,
    ) -> Result<Option<Profile>, DatabaseError> {
        let row: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(user.to_string())
            .fetch_optional(&database.pool)
            .await?;

        Ok(row.map(ProfileRow::into_profile))
    }

    /// Substring search over names and emails, excluding `exclude`.
    /// SQLite LIKE is ASCII case-insensitive, which is the contract here.
    pub(crate) async fn search(
        query: &str,
        exclude: UserId,
        limit: usize,
        database: &Database,
    ) -> Result<Vec<Profile>, DatabaseError> {
        let pattern = format!("%{}%", escape_like(query));

        let rows: Vec<ProfileRow> = sqlx::query_as(
            "SELECT * FROM profiles \
             WHERE id <> ? AND (full_name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\') \
             ORDER BY email \
             LIMIT ?",
        )
        .bind(exclude.to_string())
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&database.pool)
        .await?;

        Ok(rows.into_iter().map(ProfileRow::into_profile).collect())
    }

    /// Inserts or refreshes a directory entry. `created_at` is only set on
    /// first insert.
    pub(crate) async fn upsert(
        profile: &Profile,
        database: &Database,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO profiles (id, email, full_name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 email = excluded.email, \
                 full_name = excluded.full_name, \
                 updated_at = excluded.updated_at",
        )
        .bind(profile.id.to_string())
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(now)
        .bind(now)
        .execute(&database.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mindguard::database::tests::setup_test_database;
    use uuid::Uuid;

    fn uid(n: u128) -> UserId {
        UserId::from(Uuid::from_u128(n))
    }

    fn profile(n: u128, email: &str, full_name: Option<&str>) -> Profile {
        Profile::new(uid(n), email, full_name.map(str::to_string))
    }

    #[tokio::test]
    async fn test_upsert_then_find_round_trips() {
        let (database, _temp) = setup_test_database().await;

        let alice = profile(1, "alice@example.com", Some("Alice Lidell"));
        Profile::upsert(&alice, &database).await.unwrap();

        let found = Profile::find_by_id(uid(1), &database).await.unwrap();
        assert_eq!(found, Some(alice));

        let missing = Profile::find_by_id(uid(99), &database).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_entry() {
        let (database, _temp) = setup_test_database().await;

        Profile::upsert(&profile(1, "old@example.com", None), &database)
            .await
            .unwrap();
        Profile::upsert(&profile(1, "new@example.com", Some("Renamed")), &database)
            .await
            .unwrap();

        let found = Profile::find_by_id(uid(1), &database).await.unwrap().unwrap();
        assert_eq!(found.email, "new@example.com");
        assert_eq!(found.full_name.as_deref(), Some("Renamed"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&database.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_search_matches_name_and_email_case_insensitively() {
        let (database, _temp) = setup_test_database().await;

        Profile::upsert(&profile(1, "alice@example.com", Some("Alice Lidell")), &database)
            .await
            .unwrap();
        Profile::upsert(&profile(2, "bob@example.com", Some("Bob Stone")), &database)
            .await
            .unwrap();

        let by_name = Profile::search("LIDELL", uid(99), 10, &database).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, uid(1));

        let by_email = Profile::search("bob@", uid(99), 10, &database).await.unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].id, uid(2));
    }

    #[tokio::test]
    async fn test_search_excludes_the_given_user() {
        let (database, _temp) = setup_test_database().await;

        Profile::upsert(&profile(1, "alice@example.com", Some("Alice")), &database)
            .await
            .unwrap();
        Profile::upsert(&profile(2, "alina@example.com", Some("Alina")), &database)
            .await
            .unwrap();

        let hits = Profile::search("ali", uid(1), 10, &database).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, uid(2));
    }

    #[tokio::test]
    async fn test_search_caps_results_at_limit() {
        let (database, _temp) = setup_test_database().await;

        for n in 1..=15 {
            Profile::upsert(
                &profile(n, &format!("member{n:02}@example.com"), None),
                &database,
            )
            .await
            .unwrap();
        }

        let hits = Profile::search("member", uid(99), 10, &database).await.unwrap();
        assert_eq!(hits.len(), 10);
    }

    #[tokio::test]
    async fn test_search_treats_like_metacharacters_literally() {
        let (database, _temp) = setup_test_database().await;

        Profile::upsert(&profile(1, "percent%sign@example.com", None), &database)
            .await
            .unwrap();
        Profile::upsert(&profile(2, "percent-sign@example.com", None), &database)
            .await
            .unwrap();

        // "%" in the query only matches a literal percent sign.
        let hits = Profile::search("percent%", uid(99), 10, &database).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, uid(1));

        // "_" must not act as a single-character wildcard.
        let underscore = Profile::search("percent_sign", uid(99), 10, &database)
            .await
            .unwrap();
        assert!(underscore.is_empty());
    }

    #[test]
    fn test_escape_like_prefixes_metacharacters() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
