//! Request and response bodies of the HTTP API.

pub mod chat;
pub mod conversation;
pub mod preset;
pub mod profile;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `{"status": "ok"}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_owned(),
        }
    }
}
