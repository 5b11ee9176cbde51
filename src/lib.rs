//! Direct-messaging engine for the MindGuard wellness platform.
//!
//! Conversations are derived, not stored: the append-only message log is
//! the single source of truth, and every session folds its slice of the
//! log into a per-counterpart conversation list on demand.

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

use std::sync::Mutex;

pub mod mindguard;

pub use mindguard::conversations::{Conversation, ConversationEngine, EngineConfig, LastMessage};
pub use mindguard::database::{Database, DatabaseError};
pub use mindguard::error::{MindguardError, Result};
pub use mindguard::messages::{Message, NewMessage, ValidationError};
pub use mindguard::profiles::{Profile, UNKNOWN_USER};
pub use mindguard::sqlite_store::SqliteStore;
pub use mindguard::store::{MemoryStore, MessageFilter, MessageStore, StoreError, UserDirectory};
pub use mindguard::types::{MessageId, UserId};
pub use mindguard::{Mindguard, MindguardConfig};

static TRACING_GUARDS: OnceCell<Mutex<Option<(WorkerGuard, WorkerGuard)>>> = OnceCell::new();
static TRACING_INIT: OnceCell<()> = OnceCell::new();

fn init_tracing(logs_dir: &std::path::Path) {
    TRACING_INIT.get_or_init(|| {
        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("mindguard")
            .filename_suffix("log")
            .build(logs_dir)
            .expect("Failed to create file appender");

        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

        TRACING_GUARDS
            .set(Mutex::new(Some((file_guard, stdout_guard))))
            .ok();

        let stdout_layer = Layer::new()
            .with_writer(non_blocking_stdout)
            .with_ansi(true)
            .with_target(true);

        let file_layer = Layer::new()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true);

        Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(stdout_layer)
            .with(file_layer)
            .init();
    });
}
