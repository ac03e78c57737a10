//! System-prompt presets.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use hearth_core::entities::{Preset, PresetStore};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::schemas::StatusResponse;
use crate::schemas::preset::{PresetRequest, PresetResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_presets, create_preset, update_preset, delete_preset),
    components(schemas(PresetRequest, PresetResponse))
)]
pub struct PresetsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/presets", get(list_presets).post(create_preset))
        .route("/presets/{id}", put(update_preset).delete(delete_preset))
}

fn validate(req: &PresetRequest) -> Result<(), ServerError> {
    if req.name.trim().is_empty() {
        return Err(ServerError::BadRequest("preset name must not be empty".into()));
    }
    Ok(())
}

/// Built-in presets first, then by name.
#[utoipa::path(
    get,
    path = "/api/presets",
    tag = "presets",
    responses(
        (status = 200, description = "Preset list", body = Vec<PresetResponse>),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn list_presets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PresetResponse>>, ServerError> {
    let presets = state.store.list_presets().await?;
    Ok(Json(presets.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/presets",
    tag = "presets",
    request_body = PresetRequest,
    responses(
        (status = 200, description = "Preset created", body = PresetResponse),
        (status = 400, description = "Empty name"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn create_preset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<PresetResponse>, ServerError> {
    validate(&req)?;
    let preset = Preset {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_owned(),
        prompt: req.prompt,
        is_default: false,
        created_at: Utc::now(),
    };
    state.store.create_preset(preset.clone()).await?;
    info!(preset_id = %preset.id, name = %preset.name, "preset created");
    Ok(Json(preset.into()))
}

#[utoipa::path(
    put,
    path = "/api/presets/{id}",
    tag = "presets",
    params(("id" = String, Path, description = "Preset id")),
    request_body = PresetRequest,
    responses(
        (status = 200, description = "Preset updated", body = StatusResponse),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Unknown preset"),
    )
)]
pub async fn update_preset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<StatusResponse>, ServerError> {
    validate(&req)?;
    if !state
        .store
        .update_preset(&id, req.name.trim(), &req.prompt)
        .await?
    {
        return Err(ServerError::NotFound(format!("preset '{id}' not found")));
    }
    Ok(Json(StatusResponse::ok()))
}

/// Delete a user preset. Built-in presets are rejected with 400.
#[utoipa::path(
    delete,
    path = "/api/presets/{id}",
    tag = "presets",
    params(("id" = String, Path, description = "Preset id")),
    responses(
        (status = 200, description = "Preset deleted", body = StatusResponse),
        (status = 400, description = "Built-in preset"),
        (status = 404, description = "Unknown preset"),
    )
)]
pub async fn delete_preset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    let Some(preset) = state.store.get_preset(&id).await? else {
        return Err(ServerError::NotFound(format!("preset '{id}' not found")));
    };
    if preset.is_default {
        return Err(ServerError::BadRequest(format!(
            "preset '{}' is built in and cannot be deleted",
            preset.name
        )));
    }
    state.store.delete_preset(&id).await?;
    info!(preset_id = %id, "preset deleted");
    Ok(Json(StatusResponse::ok()))
}
