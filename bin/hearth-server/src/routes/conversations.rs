//! Conversation records and transcripts.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use hearth_core::entities::{Conversation, ConversationStore, TurnStore};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::schemas::StatusResponse;
use crate::schemas::conversation::{
    ConversationDetailResponse, ConversationResponse, CreateConversationRequest, TurnResponse,
    UpdateConversationRequest,
};
use crate::state::AppState;

/// Title of conversations created without one.
pub const UNTITLED: &str = "New Chat";

#[derive(OpenApi)]
#[openapi(
    paths(
        list_conversations,
        create_conversation,
        get_conversation,
        update_conversation,
        delete_conversation
    ),
    components(schemas(
        CreateConversationRequest,
        UpdateConversationRequest,
        ConversationResponse,
        ConversationDetailResponse,
        TurnResponse,
        StatusResponse
    ))
)]
pub struct ConversationsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/{id}",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
}

/// Most recently active first.
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    responses(
        (status = 200, description = "Conversation list", body = Vec<ConversationResponse>),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConversationResponse>>, ServerError> {
    let conversations = state.store.list_conversations().await?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/conversations",
    tag = "conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Conversation created", body = ConversationResponse),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<Json<ConversationResponse>, ServerError> {
    let model = state.resolve_model(req.model).await?;
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        title: req.title.unwrap_or_else(|| UNTITLED.to_owned()),
        model,
        created_at: now,
        updated_at: now,
    };
    state.store.create_conversation(conversation.clone()).await?;
    info!(conversation_id = %conversation.id, "conversation created");
    Ok(Json(conversation.into()))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation with transcript", body = ConversationDetailResponse),
        (status = 404, description = "Unknown conversation"),
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetailResponse>, ServerError> {
    let Some(conversation) = state.store.get_conversation(&id).await? else {
        return Err(ServerError::NotFound(format!("conversation '{id}' not found")));
    };
    let turns = state.store.list_turns(&id).await?;
    Ok(Json(ConversationDetailResponse {
        conversation: conversation.into(),
        messages: turns.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    request_body = UpdateConversationRequest,
    responses(
        (status = 200, description = "Conversation updated", body = StatusResponse),
        (status = 404, description = "Unknown conversation"),
    )
)]
pub async fn update_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<Json<StatusResponse>, ServerError> {
    let found = state
        .store
        .update_conversation(&id, req.title.as_deref(), req.model.as_deref())
        .await?;
    if !found {
        return Err(ServerError::NotFound(format!("conversation '{id}' not found")));
    }
    Ok(Json(StatusResponse::ok()))
}

/// Delete a conversation and its transcript. A relay still streaming into it
/// is aborted first. Unknown ids succeed.
#[utoipa::path(
    delete,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation deleted", body = StatusResponse),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    if state.relays.abort(&id) {
        info!(conversation_id = %id, "aborted running relay before delete");
    }
    if state.store.delete_conversation(&id).await? {
        info!(conversation_id = %id, "conversation deleted");
    }
    Ok(Json(StatusResponse::ok()))
}
