use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by the chat pipeline before or while relaying a turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The submitted message was empty or whitespace only.
    #[error("message must not be empty")]
    EmptyMessage,

    /// A conversation id was supplied but no such conversation exists.
    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),

    /// The record store failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
