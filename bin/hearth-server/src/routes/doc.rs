use utoipa::OpenApi;

use crate::routes::{chat, conversations, health, models, presets, profile, settings};

#[derive(OpenApi)]
#[openapi(info(
    title = "hearth-server",
    description = "Local chat relay in front of an Ollama server",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(conversations::ConversationsApi::openapi());
    root.merge(presets::PresetsApi::openapi());
    root.merge(profile::ProfileApi::openapi());
    root.merge(settings::SettingsApi::openapi());
    root.merge(models::ModelsApi::openapi());
    root
}
