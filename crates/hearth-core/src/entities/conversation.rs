use std::future::Future;

use chrono::Utc;

use crate::entities::{SqliteStore, dao::Conversation, parse_timestamp};

type ConversationRow = (String, String, String, String, String);

fn from_row((id, title, model, created_at, updated_at): ConversationRow) -> Conversation {
    Conversation {
        id,
        title,
        model,
        created_at: parse_timestamp(&created_at, "conversations.created_at"),
        updated_at: parse_timestamp(&updated_at, "conversations.updated_at"),
    }
}

pub trait ConversationStore: Send + Sync + 'static {
    fn create_conversation(
        &self,
        conversation: Conversation,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Conversation>, sqlx::Error>> + Send;
    /// Most recently updated first.
    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, sqlx::Error>> + Send;
    /// Returns `false` when no conversation has this id.
    fn update_conversation(
        &self,
        id: &str,
        title: Option<&str>,
        model: Option<&str>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Deletes the conversation and, through the foreign key, all its turns.
    fn delete_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, conversation: Conversation) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO conversations (id, title, model, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&conversation.id)
        .bind(&conversation.title)
        .bind(&conversation.model)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT id, title, model, created_at, updated_at FROM conversations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(from_row))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, sqlx::Error> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            "SELECT id, title, model, created_at, updated_at \
             FROM conversations ORDER BY updated_at DESC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn update_conversation(
        &self,
        id: &str,
        title: Option<&str>,
        model: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let updated_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE conversations \
             SET title = COALESCE(?1, title), model = COALESCE(?2, model), updated_at = ?3 \
             WHERE id = ?4",
        )
        .bind(title)
        .bind(model)
        .bind(&updated_at)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
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
    use crate::entities::{Role, TurnStore};
    use chrono::Duration;

    fn conversation(id: &str, age_minutes: i64) -> Conversation {
        let at = Utc::now() - Duration::minutes(age_minutes);
        Conversation {
            id: id.into(),
            title: format!("chat {id}"),
            model: "m".into(),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn list_is_most_recent_first() {
        let (store, _dir) = test_support::store().await;
        store.create_conversation(conversation("old", 30)).await.unwrap();
        store.create_conversation(conversation("new", 1)).await.unwrap();

        let ids: Vec<_> = store
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[tokio::test]
    async fn update_keeps_unset_fields() {
        let (store, _dir) = test_support::store().await;
        store.create_conversation(conversation("c", 5)).await.unwrap();

        assert!(store.update_conversation("c", Some("renamed"), None).await.unwrap());
        let c = store.get_conversation("c").await.unwrap().unwrap();
        assert_eq!(c.title, "renamed");
        assert_eq!(c.model, "m");

        assert!(!store.update_conversation("missing", Some("x"), None).await.unwrap());
    }

    #[tokio::test]
    async fn delete_cascades_to_turns() {
        let (store, _dir) = test_support::store().await;
        store.create_conversation(conversation("c", 5)).await.unwrap();
        store.append_turn("c", Role::User, "hello").await.unwrap();

        assert!(store.delete_conversation("c").await.unwrap());
        assert!(store.list_turns("c").await.unwrap().is_empty());
        assert!(!store.delete_conversation("c").await.unwrap());
    }
}
