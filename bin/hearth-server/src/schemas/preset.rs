use hearth_core::entities::Preset;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of preset create and update calls.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresetRequest {
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PresetResponse {
    pub id: String,
    pub name: String,
    pub prompt: String,
    /// Built-in presets cannot be deleted.
    pub is_default: bool,
    pub created_at: String,
}

impl From<Preset> for PresetResponse {
    fn from(p: Preset) -> Self {
        Self {
            id: p.id,
            name: p.name,
            prompt: p.prompt,
            is_default: p.is_default,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}
