use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::{SqliteStore, parse_timestamp};

/// Profile text installed on first start.
pub const DEFAULT_PROFILE: &str = "You are a coding companion running locally on the user's own machine.

## Environment
- Models are served by a local Ollama instance; nothing leaves this machine.
- The user works mostly from a Linux shell.

## How to Respond
- Be direct and concise; assume an experienced developer.
- Prefer complete, working examples over fragments.
- Prefer command-line solutions over GUI ones.
- Explain trade-offs when more than one approach is reasonable.";

/// The singleton profile row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub content: String,
    /// `None` until the row exists.
    pub updated_at: Option<DateTime<Utc>>,
}

pub trait ProfileStore: Send + Sync + 'static {
    /// An empty profile is returned when the row has never been written.
    fn get_profile(&self) -> impl Future<Output = Result<Profile, sqlx::Error>> + Send;
    /// Replace the profile text; returns the new `updated_at`.
    fn set_profile(
        &self,
        content: &str,
    ) -> impl Future<Output = Result<DateTime<Utc>, sqlx::Error>> + Send;
}

impl ProfileStore for SqliteStore {
    async fn get_profile(&self) -> Result<Profile, sqlx::Error> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT content, updated_at FROM profile WHERE id = 1")
                .fetch_optional(self.pool())
                .await?;
        Ok(match row {
            Some((content, updated_at)) => Profile {
                content,
                updated_at: Some(parse_timestamp(&updated_at, "profile.updated_at")),
            },
            None => Profile {
                content: String::new(),
                updated_at: None,
            },
        })
    }

    async fn set_profile(&self, content: &str) -> Result<DateTime<Utc>, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO profile (id, content, updated_at) VALUES (1, ?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET content = ?1, updated_at = ?2",
        )
        .bind(content)
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(now)
    }
}
