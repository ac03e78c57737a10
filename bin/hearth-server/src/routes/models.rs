//! Model listings proxied from the inference backend.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models, running_models))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models))
        .route("/ps", get(running_models))
}

/// Installed models, as reported by Ollama's `/api/tags`.
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    responses(
        (status = 200, description = "Installed models", body = Value),
        (status = 502, description = "Ollama unreachable or failed"),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ServerError> {
    Ok(Json(state.backend.list_models().await?))
}

/// Models currently loaded, as reported by Ollama's `/api/ps`.
#[utoipa::path(
    get,
    path = "/api/ps",
    tag = "models",
    responses(
        (status = 200, description = "Loaded models", body = Value),
        (status = 502, description = "Ollama unreachable or failed"),
    )
)]
pub async fn running_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ServerError> {
    Ok(Json(state.backend.running_models().await?))
}
