//! Chat turns streamed over server-sent events.
//!
//! The user turn is validated and stored before the response starts, so
//! those failures come back as ordinary JSON errors. After that the relay runs
//! in its own task and everything it reports, errors included, arrives as
//! `data:` events on the stream.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use hearth_core::chat::relay::{self, RelayEvent};
use hearth_core::chat::{AssembleRequest, assemble};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::StatusResponse;
use crate::schemas::chat::{ChatStreamEvent, ChatTurnRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(chat, abort_chat),
    components(schemas(ChatTurnRequest, ChatStreamEvent, StatusResponse))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/{conversation_id}/abort", post(abort_chat))
}

fn to_sse(event: RelayEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(ChatStreamEvent::from(event))
}

/// Submit a user turn and stream the model's reply.
///
/// Each event's `data` is one JSON object: `{token, conversation_id}` per
/// fragment, then either `{done: true, conversation_id}` or `{error}`.
/// Closing the stream aborts the turn; nothing is stored for the reply.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatTurnRequest,
    responses(
        (status = 200, description = "Event stream of the reply", body = ChatStreamEvent, content_type = "text/event-stream"),
        (status = 400, description = "Empty message"),
        (status = 404, description = "Unknown conversation"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatTurnRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ServerError> {
    let model = state.resolve_model(req.model).await?;
    let context = assemble(
        &*state.store,
        AssembleRequest {
            conversation_id: req.conversation_id,
            message: req.message,
            model: model.clone(),
            preset: req.system_prompt,
        },
    )
    .await?;

    let conversation_id = context.conversation_id.clone();
    info!(
        conversation_id = %conversation_id,
        model = %model,
        created = context.created,
        history = context.messages.len(),
        "chat turn accepted"
    );

    let (tx, rx) = relay::channel();
    let chat_relay = Arc::clone(&state.relay);
    let run = async move {
        let outcome = chat_relay.run(&model, context, tx).await;
        debug!(
            state = %outcome.state,
            fragments = outcome.fragments,
            saved = outcome.assistant_turn.is_some(),
            "relay finished"
        );
    };
    // Keep the request's trace id on the relay's log lines.
    state.relays.spawn(conversation_id, run.in_current_span());

    Ok(Sse::new(ReceiverStream::new(rx).map(to_sse)).keep_alive(KeepAlive::default()))
}

/// Abort the reply currently streaming into a conversation.
#[utoipa::path(
    post,
    path = "/api/chat/{conversation_id}/abort",
    tag = "chat",
    params(("conversation_id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Relay aborted", body = StatusResponse),
        (status = 404, description = "No reply is streaming for this conversation"),
    )
)]
pub async fn abort_chat(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    if !state.relays.abort(&conversation_id) {
        return Err(ServerError::NotFound(format!(
            "no reply is streaming for conversation '{conversation_id}'"
        )));
    }
    info!(conversation_id = %conversation_id, "relay aborted by client");
    Ok(Json(StatusResponse::ok()))
}
