//! The persistent user profile.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use hearth_core::entities::{DEFAULT_PROFILE, ProfileStore};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::profile::{
    DefaultProfileResponse, ProfileResponse, ProfileUpdatedResponse, UpdateProfileRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_profile, update_profile, get_default_profile),
    components(schemas(
        ProfileResponse,
        UpdateProfileRequest,
        ProfileUpdatedResponse,
        DefaultProfileResponse
    ))
)]
pub struct ProfileApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/default", get(get_default_profile))
}

#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "profile",
    responses(
        (status = 200, description = "Current profile", body = ProfileResponse),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProfileResponse>, ServerError> {
    Ok(Json(state.store.get_profile().await?.into()))
}

/// Replace the profile text. Takes effect on the next chat turn.
#[utoipa::path(
    put,
    path = "/api/profile",
    tag = "profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = ProfileUpdatedResponse),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdatedResponse>, ServerError> {
    let updated_at = state.store.set_profile(&req.content).await?;
    info!(len = req.content.len(), "profile updated");
    Ok(Json(ProfileUpdatedResponse {
        status: "ok".to_owned(),
        updated_at: updated_at.to_rfc3339(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/profile/default",
    tag = "profile",
    responses(
        (status = 200, description = "Built-in profile text", body = DefaultProfileResponse),
    )
)]
pub async fn get_default_profile() -> Json<DefaultProfileResponse> {
    Json(DefaultProfileResponse {
        content: DEFAULT_PROFILE.to_owned(),
    })
}
