//! Ollama HTTP client.
//!
//! Uses a short connect timeout and a long per-read timeout: token
//! generation on a local GPU can pause for a long time between lines, but a
//! dead server should be reported quickly.

use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, info};

use super::{BackendError, ChatRequest, ChunkStream, InferenceBackend, ndjson};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// Base URL without trailing slash, e.g. `http://localhost:11434`.
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, client })
    }

    /// Client for `base_url` with the default timeouts.
    pub fn with_defaults(base_url: impl Into<String>) -> Result<Self, BackendError> {
        Self::new(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installed models (`GET /api/tags`), passed through as JSON.
    pub async fn list_models(&self) -> Result<Value, BackendError> {
        self.get_json("/api/tags").await
    }

    /// Models currently loaded in memory (`GET /api/ps`).
    pub async fn running_models(&self) -> Result<Value, BackendError> {
        self.get_json("/api/ps").await
    }

    async fn get_json(&self, path: &str) -> Result<Value, BackendError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_connect() {
            BackendError::Unreachable {
                url: self.base_url.clone(),
            }
        } else {
            map_transport_error(e)
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Transport(format!("timed out waiting for Ollama: {e}"))
    } else {
        BackendError::Transport(e.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: body.trim().to_owned(),
    })
}

impl InferenceBackend for OllamaClient {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, BackendError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            total_chars = request.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "opening Ollama chat stream"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = ensure_success(response).await?;
        info!(
            model = %request.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Ollama accepted chat request"
        );

        Ok(ndjson::chunks(response.bytes_stream())
            .map_err(map_transport_error)
            .boxed())
    }
}
