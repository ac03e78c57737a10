//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (CORS, per-request trace ids)
//! - optional Swagger UI / OpenAPI document (`HEARTH_ENABLE_SWAGGER=false` to disable)
//! - `/health`
//! - the JSON + event-stream API under `/api`

mod chat;
mod conversations;
pub mod doc;
mod health;
mod models;
mod presets;
mod profile;
mod settings;

use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Routes nested under `/api`.
fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat::router())
        .merge(conversations::router())
        .merge(presets::router())
        .merge(profile::router())
        .merge(settings::router())
        .merge(models::router())
}

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api_router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use hearth_core::entities::{ConversationStore, Role, TurnStore};
    use hearth_core::{OllamaClient, SqliteStore};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use tracing_test::traced_test;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::Config;

    async fn test_state(ollama_url: &str) -> (Arc<AppState>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("hearth.db")).await.unwrap();
        store.seed("llama3").await.unwrap();
        let backend = OllamaClient::with_defaults(ollama_url).unwrap();
        let config = Config {
            ollama_url: ollama_url.to_owned(),
            default_model: "llama3".to_owned(),
            ..Config::default()
        };
        (Arc::new(AppState::new(config, store, backend)), dir)
    }

    async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        url
    }

    async fn send(state: &Arc<AppState>, method: Method, uri: &str, body: Option<Value>) -> Response {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        };
        build(state.clone()).oneshot(request.unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Read an event stream to its end and decode every `data:` payload.
    async fn sse_events(response: Response) -> Vec<Value> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[traced_test]
    #[tokio::test]
    async fn chat_streams_tokens_then_done() {
        let mock_server = MockServer::start().await;
        let body = "{\"message\":{\"content\":\"Hel\"}}\n{\"message\":{\"content\":\"lo\"}}\n{\"done\":true}\n";
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&mock_server)
            .await;
        let (state, _dir) = test_state(&mock_server.uri()).await;

        let response = send(
            &state,
            Method::POST,
            "/api/chat",
            Some(json!({"message": "Say hello", "system_prompt": "Be concise."})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let events = sse_events(response).await;
        let id = events[0]["conversation_id"].as_str().unwrap().to_owned();
        assert_eq!(
            events,
            vec![
                json!({"token": "Hel", "conversation_id": id}),
                json!({"token": "lo", "conversation_id": id}),
                json!({"done": true, "conversation_id": id}),
            ]
        );

        let turns = state.store.list_turns(&id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "Hello");
        let conversation = state.store.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conversation.model, "llama3");
        assert!(logs_contain("chat turn accepted"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_streaming() {
        let (state, _dir) = test_state(&unreachable_url().await).await;
        let response = send(&state, Method::POST, "/api/chat", Some(json!({"message": "   "}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "message must not be empty");
        assert!(state.store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (state, _dir) = test_state(&unreachable_url().await).await;
        let response = send(
            &state,
            Method::POST,
            "/api/chat",
            Some(json!({"conversation_id": "nope", "message": "hi"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreachable_backend_streams_one_error() {
        let url = unreachable_url().await;
        let (state, _dir) = test_state(&url).await;
        let response = send(&state, Method::POST, "/api/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let events = sse_events(response).await;
        assert_eq!(
            events,
            vec![json!({"error": format!("Cannot connect to Ollama at {url}. Is it running?")})]
        );

        // The user turn survives the failed call.
        let conversations = state.store.list_conversations().await.unwrap();
        let turns = state.store.list_turns(&conversations[0].id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test]
    async fn model_listing_reports_bad_gateway_when_unreachable() {
        let (state, _dir) = test_state(&unreachable_url().await).await;
        let response = send(&state, Method::GET, "/api/models", None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn abort_without_running_relay_is_not_found() {
        let (state, _dir) = test_state(&unreachable_url().await).await;
        let response = send(&state, Method::POST, "/api/chat/nope/abort", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn abort_ends_a_stalled_stream() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"done\":true}\n", "application/x-ndjson")
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&mock_server)
            .await;
        let (state, _dir) = test_state(&mock_server.uri()).await;

        let response = send(&state, Method::POST, "/api/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let id = state.store.list_conversations().await.unwrap()[0].id.clone();
        assert!(state.relays.is_running(&id));

        let aborted = send(&state, Method::POST, &format!("/api/chat/{id}/abort"), None).await;
        assert_eq!(aborted.status(), StatusCode::OK);
        assert_eq!(json_body(aborted).await["status"], "ok");

        let events = tokio::time::timeout(Duration::from_secs(5), sse_events(response))
            .await
            .expect("stream did not end after abort");
        assert!(events.is_empty());

        let turns = state.store.list_turns(&id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
        let again = send(&state, Method::POST, &format!("/api/chat/{id}/abort"), None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn built_in_presets_cannot_be_deleted() {
        let (state, _dir) = test_state(&unreachable_url().await).await;
        let presets = json_body(send(&state, Method::GET, "/api/presets", None).await).await;
        let builtin = presets[0]["id"].as_str().unwrap().to_owned();
        assert_eq!(presets[0]["is_default"], true);

        let response = send(&state, Method::DELETE, &format!("/api/presets/{builtin}"), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let created = json_body(
            send(
                &state,
                Method::POST,
                "/api/presets",
                Some(json!({"name": "Pirate", "prompt": "Talk like a pirate."})),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();
        assert_eq!(created["is_default"], false);

        let response = send(&state, Method::DELETE, &format!("/api/presets/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&state, Method::DELETE, &format!("/api/presets/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_and_settings_round_trip() {
        let (state, _dir) = test_state(&unreachable_url().await).await;

        let response = send(&state, Method::PUT, "/api/profile", Some(json!({"content": "I use Arch."}))).await;
        assert_eq!(json_body(response).await["status"], "ok");
        let profile = json_body(send(&state, Method::GET, "/api/profile", None).await).await;
        assert_eq!(profile["content"], "I use Arch.");
        assert!(profile["updated_at"].is_string());

        let response = send(
            &state,
            Method::PUT,
            "/api/settings",
            Some(json!({"profile_enabled": false, "default_model": "qwen2"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let settings = json_body(send(&state, Method::GET, "/api/settings", None).await).await;
        assert_eq!(settings["profile_enabled"], "false");
        assert_eq!(settings["default_model"], "qwen2");
        assert_eq!(state.resolve_model(None).await.unwrap(), "qwen2");
    }

    #[tokio::test]
    async fn conversation_crud() {
        let (state, _dir) = test_state(&unreachable_url().await).await;

        let created = json_body(send(&state, Method::POST, "/api/conversations", Some(json!({}))).await).await;
        assert_eq!(created["title"], "New Chat");
        assert_eq!(created["model"], "llama3");
        let id = created["id"].as_str().unwrap().to_owned();
        let uri = format!("/api/conversations/{id}");

        let response = send(&state, Method::PUT, &uri, Some(json!({"title": "Renamed"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let detail = json_body(send(&state, Method::GET, &uri, None).await).await;
        assert_eq!(detail["conversation"]["title"], "Renamed");
        assert_eq!(detail["messages"], json!([]));

        let response = send(&state, Method::DELETE, &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&state, Method::GET, &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&state, Method::PUT, &uri, Some(json!({"title": "x"}))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn swagger_can_be_disabled() {
        let (state, _dir) = test_state(&unreachable_url().await).await;
        let response = send(&state, Method::GET, "/api-docs/openapi.json", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut config = (*state.config).clone();
        config.enable_swagger = false;
        let state = Arc::new(AppState {
            config: Arc::new(config),
            ..(*state).clone()
        });
        let response = send(&state, Method::GET, "/api-docs/openapi.json", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
