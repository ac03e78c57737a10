//! Record store.
//!
//! Each concern (conversations, turns, presets, profile, settings) is a small
//! trait using `impl Future` signatures, all implemented by [`SqliteStore`].
//! Handlers and the chat pipeline are generic over the traits so another
//! backing store only has to implement them.

pub mod conversation;
pub mod dao;
pub mod preset;
pub mod profile;
pub mod settings;
pub mod turn;

pub use dao::{Conversation, Preset, Role, Turn};

pub use conversation::ConversationStore;
pub use preset::PresetStore;
pub use profile::{DEFAULT_PROFILE, Profile, ProfileStore};
pub use settings::{DEFAULT_MODEL_KEY, PROFILE_ENABLED_KEY, SettingsStore};
pub use turn::{TurnStore, TurnTarget};

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, warn};
use uuid::Uuid;

/// Built-in presets seeded into an empty `presets` table.
pub const DEFAULT_PRESETS: &[(&str, &str)] = &[
    (
        "Coding Companion",
        "You are a senior software engineer pairing with the user. Write clean, \
         complete, working code and explain the trade-offs behind non-obvious choices.",
    ),
    (
        "Linux Sysadmin",
        "You are an experienced Linux systems administrator. Prefer command-line \
         solutions, call out anything destructive, and keep answers short.",
    ),
    (
        "General Assistant",
        "You are a helpful general-purpose assistant. Be clear and concise.",
    ),
];

/// SQLite-backed store for every hearth record type.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL such as `"sqlite://hearth.db"`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?;
        Self::connect_with(options).await
    }

    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert the built-in profile, presets and settings where missing.
    ///
    /// Existing rows are never overwritten, so running this on every start is
    /// safe.
    pub async fn seed(&self, default_model: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO profile (id, content, updated_at) VALUES (1, ?1, ?2)")
            .bind(DEFAULT_PROFILE)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        let (presets,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM presets")
            .fetch_one(&mut *tx)
            .await?;
        if presets == 0 {
            for (name, prompt) in DEFAULT_PRESETS {
                sqlx::query(
                    "INSERT INTO presets (id, name, prompt, is_default, created_at) \
                     VALUES (?1, ?2, ?3, 1, ?4)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(name)
                .bind(prompt)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            }
            debug!(count = DEFAULT_PRESETS.len(), "seeded default presets");
        }

        for (key, value) in [(PROFILE_ENABLED_KEY, "true"), (DEFAULT_MODEL_KEY, default_model)] {
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse an RFC 3339 column, falling back to "now" for rows written by hand.
pub(crate) fn parse_timestamp(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        warn!(raw = %raw, column, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::SqliteStore;
    use tempfile::TempDir;

    /// A seeded store backed by a file in a fresh temporary directory.
    pub async fn store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("hearth.db")).await.unwrap();
        store.seed("test-model").await.unwrap();
        (store, dir)
    }
}
