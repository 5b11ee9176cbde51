use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

pub mod conversations;
pub mod database;
pub mod error;
pub mod messages;
pub mod profiles;
pub mod sqlite_store;
pub mod store;
pub mod types;

use crate::init_tracing;
use conversations::{ConversationEngine, EngineConfig};
use database::Database;
use error::Result;
use profiles::Profile;
use sqlite_store::SqliteStore;
use store::{MessageStore, UserDirectory};
use types::UserId;

#[derive(Clone, Debug)]
pub struct MindguardConfig {
    /// Directory for application data
    pub data_dir: PathBuf,

    /// Directory for application logs
    pub logs_dir: PathBuf,

    /// Settings applied to every session opened through this instance.
    pub engine: EngineConfig,
}

impl MindguardConfig {
    /// Builds a config rooted at the given directories, suffixed per build
    /// environment so debug and release builds never share state.
    pub fn new(data_dir: &Path, logs_dir: &Path) -> Self {
        let env_suffix: &str = if cfg!(debug_assertions) { "dev" } else { "release" };
        let formatted_data_dir = data_dir.join(env_suffix);
        let formatted_logs_dir = logs_dir.join(env_suffix);

        Self {
            data_dir: formatted_data_dir,
            logs_dir: formatted_logs_dir,
            engine: EngineConfig::default(),
        }
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Top-level handle over the embedded store.
///
/// Owns the database and hands out per-user [`ConversationEngine`]
/// sessions that all share it.
pub struct Mindguard {
    pub config: MindguardConfig,
    database: Arc<Database>,
    store: Arc<SqliteStore>,
}

impl fmt::Debug for Mindguard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mindguard")
            .field("config", &self.config)
            .field("database", &"<REDACTED>")
            .finish()
    }
}

impl Mindguard {
    /// Initializes the messaging engine: creates the data and log
    /// directories, sets up logging, and opens the database with all
    /// migrations applied.
    pub async fn initialize(config: MindguardConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))?;
        std::fs::create_dir_all(&config.logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", config.logs_dir))?;

        init_tracing(&config.logs_dir);
        tracing::debug!(
            target: "mindguard::initialize",
            "Logging initialized in directory: {:?}",
            config.logs_dir
        );

        let database = Arc::new(Database::new(config.data_dir.join("mindguard.sqlite")).await?);
        let store = Arc::new(SqliteStore::new(Arc::clone(&database)));

        tracing::debug!(target: "mindguard::initialize", "Mindguard initialization complete");

        Ok(Self {
            config,
            database,
            store,
        })
    }

    /// Opens a conversation session for `viewer`, backed by the shared
    /// store. The session starts with an empty cache; call
    /// [`ConversationEngine::refresh`] to populate it.
    pub fn open_session(&self, viewer: UserId) -> ConversationEngine {
        let store: Arc<dyn MessageStore> = self.store.clone();
        let directory: Arc<dyn UserDirectory> = self.store.clone();
        ConversationEngine::with_config(viewer, store, directory, self.config.engine.clone())
    }

    /// Inserts or refreshes a directory entry.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        Ok(self.store.upsert_profile(profile).await?)
    }

    /// Deletes all messages, profiles, and log files.
    pub async fn delete_all_data(&self) -> Result<()> {
        tracing::debug!(target: "mindguard::delete_all_data", "Deleting all data");

        self.database.delete_all_data().await?;

        if self.config.logs_dir.exists() {
            for entry in std::fs::read_dir(&self.config.logs_dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() {
                    std::fs::remove_file(&path)?;
                } else if path.is_dir() {
                    std::fs::remove_dir_all(&path)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config() -> (MindguardConfig, TempDir, TempDir) {
        let data_temp_dir = TempDir::new().expect("Failed to create temp data dir");
        let logs_temp_dir = TempDir::new().expect("Failed to create temp logs dir");

        let config = MindguardConfig::new(data_temp_dir.path(), logs_temp_dir.path());

        (config, data_temp_dir, logs_temp_dir)
    }

    async fn test_mindguard() -> (Mindguard, TempDir, TempDir) {
        let (config, data_temp, logs_temp) = create_test_config();
        let mindguard = Mindguard::initialize(config).await.unwrap();
        (mindguard, data_temp, logs_temp)
    }

    #[test]
    fn test_config_applies_environment_suffix() {
        let data_dir = Path::new("/test/data");
        let logs_dir = Path::new("/test/logs");

        let config = MindguardConfig::new(data_dir, logs_dir);

        if cfg!(debug_assertions) {
            assert_eq!(config.data_dir, data_dir.join("dev"));
            assert_eq!(config.logs_dir, logs_dir.join("dev"));
        } else {
            assert_eq!(config.data_dir, data_dir.join("release"));
            assert_eq!(config.logs_dir, logs_dir.join("release"));
        }
    }

    #[test]
    fn test_config_with_engine_overrides() {
        let (config, _data_temp, _logs_temp) = create_test_config();

        let engine = EngineConfig {
            default_greeting: "Hello there".to_string(),
            ..EngineConfig::default()
        };
        let config = config.with_engine_config(engine.clone());

        assert_eq!(config.engine, engine);
    }

    #[tokio::test]
    async fn test_initialize_creates_directories_and_database() {
        let (mindguard, _data_temp, _logs_temp) = test_mindguard().await;

        assert!(mindguard.config.data_dir.exists());
        assert!(mindguard.config.logs_dir.exists());
        assert!(mindguard.config.data_dir.join("mindguard.sqlite").exists());
    }

    #[tokio::test]
    async fn test_debug_output_redacts_database() {
        let (mindguard, _data_temp, _logs_temp) = test_mindguard().await;

        let debug = format!("{:?}", mindguard);
        assert!(debug.contains("Mindguard"));
        assert!(debug.contains("config"));
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains("SqlitePool"));
    }

    #[tokio::test]
    async fn test_sessions_share_one_store() {
        let (mindguard, _data_temp, _logs_temp) = test_mindguard().await;

        let alice = UserId::new();
        let bob = UserId::new();
        mindguard
            .upsert_profile(&Profile::new(alice, "alice@example.com", None))
            .await
            .unwrap();
        mindguard
            .upsert_profile(&Profile::new(bob, "bob@example.com", None))
            .await
            .unwrap();

        let mut alice_session = mindguard.open_session(alice);
        let (conversation, created) = alice_session.start_conversation(bob, None).await.unwrap();
        assert!(created);
        assert_eq!(conversation.counterpart_name, "bob@example.com");

        let mut bob_session = mindguard.open_session(bob);
        bob_session.refresh().await.unwrap();

        let list = bob_session.conversations();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].counterpart_id, alice);
        assert_eq!(list[0].unread_count, 1);
        assert_eq!(list[0].last_message.content, "Hi! I'd like to connect with you.");
    }

    #[tokio::test]
    async fn test_delete_all_data_resets_everything() {
        let (mindguard, _data_temp, _logs_temp) = test_mindguard().await;

        let alice = UserId::new();
        let bob = UserId::new();
        mindguard
            .upsert_profile(&Profile::new(alice, "alice@example.com", None))
            .await
            .unwrap();
        mindguard
            .upsert_profile(&Profile::new(bob, "bob@example.com", None))
            .await
            .unwrap();

        let mut session = mindguard.open_session(alice);
        session.send_message(bob, "hello").await.unwrap();

        mindguard.delete_all_data().await.unwrap();

        let mut session = mindguard.open_session(alice);
        session.refresh().await.unwrap();
        assert!(session.conversations().is_empty());
    }
}
