//! Key/value settings (profile toggle, default model, client preferences).

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use hearth_core::entities::SettingsStore;
use serde_json::{Map, Value};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::StatusResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_settings, update_settings), components(schemas(StatusResponse)))]
pub struct SettingsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}

#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    responses(
        (status = 200, description = "All settings", body = Value),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, String>>, ServerError> {
    let settings = state.store.list_settings().await?;
    Ok(Json(settings.into_iter().collect()))
}

/// Merge the given keys into the settings. Values are stored as strings;
/// booleans and numbers are written in their JSON spelling.
#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "settings",
    request_body = Value,
    responses(
        (status = 200, description = "Settings saved", body = StatusResponse),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Map<String, Value>>,
) -> Result<Json<StatusResponse>, ServerError> {
    for (key, value) in &req {
        state.store.set_setting(key, &setting_value(value)).await?;
    }
    info!(keys = ?req.keys().collect::<Vec<_>>(), "settings updated");
    Ok(Json(StatusResponse::ok()))
}

fn setting_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
