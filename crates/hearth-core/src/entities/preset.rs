use std::future::Future;

use crate::entities::{SqliteStore, dao::Preset, parse_timestamp};

type PresetRow = (String, String, String, bool, String);

fn from_row((id, name, prompt, is_default, created_at): PresetRow) -> Preset {
    Preset {
        id,
        name,
        prompt,
        is_default,
        created_at: parse_timestamp(&created_at, "presets.created_at"),
    }
}

pub trait PresetStore: Send + Sync + 'static {
    /// Built-in presets first, then alphabetical.
    fn list_presets(&self) -> impl Future<Output = Result<Vec<Preset>, sqlx::Error>> + Send;
    fn get_preset(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Preset>, sqlx::Error>> + Send;
    fn create_preset(&self, preset: Preset) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Returns `false` when no preset has this id.
    fn update_preset(
        &self,
        id: &str,
        name: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Deletes a user preset. Built-in presets are left alone and `false` is
    /// returned for them, as for unknown ids.
    fn delete_preset(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl PresetStore for SqliteStore {
    async fn list_presets(&self) -> Result<Vec<Preset>, sqlx::Error> {
        let rows: Vec<PresetRow> = sqlx::query_as(
            "SELECT id, name, prompt, is_default, created_at \
             FROM presets ORDER BY is_default DESC, name ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn get_preset(&self, id: &str) -> Result<Option<Preset>, sqlx::Error> {
        let row: Option<PresetRow> = sqlx::query_as(
            "SELECT id, name, prompt, is_default, created_at FROM presets WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(from_row))
    }

    async fn create_preset(&self, preset: Preset) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO presets (id, name, prompt, is_default, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&preset.id)
        .bind(&preset.name)
        .bind(&preset.prompt)
        .bind(preset.is_default)
        .bind(preset.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn update_preset(&self, id: &str, name: &str, prompt: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE presets SET name = ?1, prompt = ?2 WHERE id = ?3")
            .bind(name)
            .bind(prompt)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_preset(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM presets WHERE id = ?1 AND is_default = 0")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::test_support;
    use chrono::Utc;

    fn user_preset(id: &str, name: &str) -> Preset {
        Preset {
            id: id.into(),
            name: name.into(),
            prompt: "Be concise.".into(),
            is_default: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn defaults_sort_before_user_presets() {
        let (store, _dir) = test_support::store().await;
        store.create_preset(user_preset("p", "Aardvark")).await.unwrap();

        let presets = store.list_presets().await.unwrap();
        assert!(presets[..presets.len() - 1].iter().all(|p| p.is_default));
        assert_eq!(presets.last().map(|p| p.name.as_str()), Some("Aardvark"));
    }

    #[tokio::test]
    async fn built_in_presets_cannot_be_deleted() {
        let (store, _dir) = test_support::store().await;
        let builtin = store.list_presets().await.unwrap().remove(0);
        assert!(!store.delete_preset(&builtin.id).await.unwrap());
        assert!(store.get_preset(&builtin.id).await.unwrap().is_some());

        store.create_preset(user_preset("p", "Mine")).await.unwrap();
        assert!(store.delete_preset("p").await.unwrap());
        assert!(store.get_preset("p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_reports_missing_ids() {
        let (store, _dir) = test_support::store().await;
        store.create_preset(user_preset("p", "Mine")).await.unwrap();
        assert!(store.update_preset("p", "Renamed", "Be brief.").await.unwrap());
        assert!(!store.update_preset("nope", "x", "y").await.unwrap());

        let p = store.get_preset("p").await.unwrap().unwrap();
        assert_eq!((p.name.as_str(), p.prompt.as_str()), ("Renamed", "Be brief."));
    }
}
