//! Inference backend client.
//!
//! [`InferenceBackend`] is the seam between the relay and the model server.
//! [`ollama::OllamaClient`] speaks Ollama's `/api/chat` protocol: a JSON
//! request answered by newline-delimited JSON objects, decoded lazily by
//! [`ndjson`].

pub mod ndjson;
pub mod ollama;

use std::future::Future;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::Role;

pub use ollama::OllamaClient;

/// Errors raised while talking to the inference backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure or connect timeout.
    #[error("Cannot connect to Ollama at {url}. Is it running?")]
    Unreachable { url: String },

    /// The backend answered with a non-success HTTP status.
    #[error("Ollama returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The connection failed or timed out after the request was accepted.
    #[error("connection to Ollama failed: {0}")]
    Transport(String),

    /// A non-streaming reply could not be decoded.
    #[error("invalid response from Ollama: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BackendError::Unreachable { .. })
    }
}

/// One message of the context sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Generation options forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatOptions {
    /// Sequences the model must stop at, e.g. a simulated `"User:"` turn.
    pub stop: Vec<String>,
}

/// Body of a streaming `/api/chat` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: ChatOptions,
}

/// `message` object of a streamed line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One decoded line of a streamed reply.
///
/// Every field is optional: keep-alive or unknown objects decode to a chunk
/// that carries neither a fragment nor the completion flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    /// Error text some backends emit in-band.
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatChunk {
    /// Generated text carried by this chunk, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// Ordered, finite, single-use sequence of decoded chunks.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, BackendError>>;

pub trait InferenceBackend: Send + Sync + 'static {
    /// Open a streamed chat request. Resolves once response headers arrive.
    fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChunkStream, BackendError>> + Send;
}
