use std::future::Future;

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use crate::entities::{
    SqliteStore,
    dao::{Conversation, Role, Turn},
    parse_timestamp,
};

/// Where a user turn lands: a conversation created together with the turn, or
/// one that must already exist.
#[derive(Debug, Clone)]
pub enum TurnTarget {
    New(Conversation),
    Existing(String),
}

impl TurnTarget {
    pub fn conversation_id(&self) -> &str {
        match self {
            TurnTarget::New(c) => &c.id,
            TurnTarget::Existing(id) => id,
        }
    }
}

type TurnRow = (i64, String, String, String, String);

fn from_row((id, conversation_id, role, content, created_at): TurnRow) -> Result<Turn, sqlx::Error> {
    let role = role
        .parse::<Role>()
        .map_err(|e| sqlx::Error::Decode(format!("turn {id} has role '{role}': {e}").into()))?;
    Ok(Turn {
        id,
        conversation_id,
        role,
        content,
        created_at: parse_timestamp(&created_at, "turns.created_at"),
    })
}

pub trait TurnStore: Send + Sync + 'static {
    /// Append a turn to an existing conversation and bump its `updated_at`.
    fn append_turn(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> impl Future<Output = Result<Turn, sqlx::Error>> + Send;

    /// Create or touch the target conversation and append a user turn, in a
    /// single transaction.
    ///
    /// Returns `None`, with nothing written, when the target is
    /// [`TurnTarget::Existing`] and no such conversation exists.
    fn append_user_turn(
        &self,
        target: &TurnTarget,
        content: &str,
    ) -> impl Future<Output = Result<Option<Turn>, sqlx::Error>> + Send;

    /// Full transcript of a conversation in insertion order.
    fn list_turns(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Turn>, sqlx::Error>> + Send;
}

async fn insert_turn(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
    role: Role,
    content: &str,
) -> Result<Turn, sqlx::Error> {
    let created_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO turns (conversation_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(conversation_id)
    .bind(role.as_ref())
    .bind(content)
    .bind(created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(Turn {
        id: result.last_insert_rowid(),
        conversation_id: conversation_id.to_owned(),
        role,
        content: content.to_owned(),
        created_at,
    })
}

async fn touch(tx: &mut Transaction<'_, Sqlite>, conversation_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
        .bind(Utc::now().to_rfc3339())
        .bind(conversation_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

impl TurnStore for SqliteStore {
    async fn append_turn(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Turn, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        touch(&mut tx, conversation_id).await?;
        let turn = insert_turn(&mut tx, conversation_id, role, content).await?;
        tx.commit().await?;
        Ok(turn)
    }

    async fn append_user_turn(
        &self,
        target: &TurnTarget,
        content: &str,
    ) -> Result<Option<Turn>, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        match target {
            TurnTarget::New(conversation) => {
                sqlx::query(
                    "INSERT INTO conversations (id, title, model, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(&conversation.id)
                .bind(&conversation.title)
                .bind(&conversation.model)
                .bind(conversation.created_at.to_rfc3339())
                .bind(conversation.updated_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
            }
            TurnTarget::Existing(id) => {
                if !touch(&mut tx, id).await? {
                    tx.rollback().await?;
                    return Ok(None);
                }
            }
        }
        let turn = insert_turn(&mut tx, target.conversation_id(), Role::User, content).await?;
        tx.commit().await?;
        Ok(Some(turn))
    }

    async fn list_turns(&self, conversation_id: &str) -> Result<Vec<Turn>, sqlx::Error> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            "SELECT id, conversation_id, role, content, created_at \
             FROM turns WHERE conversation_id = ?1 ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(from_row).collect()
    }
}
