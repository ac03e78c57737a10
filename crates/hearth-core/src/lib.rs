//! hearth-core: a local chat relay in front of an Ollama-compatible model
//! server.
//!
//! A user turn flows through [`chat::assemble`], which stores it and builds
//! the full context, then through [`chat::InferenceRelay::run`], which streams
//! the backend's reply to the client and stores it once the backend finishes.

pub mod backend;
pub mod chat;
pub mod entities;
pub mod error;

pub use backend::{BackendError, InferenceBackend, OllamaClient};
pub use entities::SqliteStore;
pub use error::ChatError;
