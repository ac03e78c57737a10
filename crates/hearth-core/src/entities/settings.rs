use std::future::Future;

use crate::entities::SqliteStore;

/// `"true"` / `"false"`: whether the profile is injected into every turn.
pub const PROFILE_ENABLED_KEY: &str = "profile_enabled";
/// Model used when a chat request does not name one.
pub const DEFAULT_MODEL_KEY: &str = "default_model";

pub trait SettingsStore: Send + Sync + 'static {
    fn get_setting(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;
    fn set_setting(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn list_settings(
        &self,
    ) -> impl Future<Output = Result<Vec<(String, String)>, sqlx::Error>> + Send;

    /// Only `"true"` (any case) enables the profile. A missing key counts as
    /// enabled, matching the seeded default.
    fn profile_enabled(&self) -> impl Future<Output = Result<bool, sqlx::Error>> + Send {
        async move {
            let value = self.get_setting(PROFILE_ENABLED_KEY).await?;
            Ok(value.is_none_or(|v| v.trim().eq_ignore_ascii_case("true")))
        }
    }
}

impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = ?2",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_settings(&self) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(self.pool())
            .await
    }
}
