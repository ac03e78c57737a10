use hearth_core::entities::Profile;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub content: String,
    /// `None` until the profile has been written once.
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdatedResponse {
    pub status: String,
    pub updated_at: String,
}

/// The built-in profile text, used by "reset to default".
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DefaultProfileResponse {
    pub content: String,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            content: p.content,
            updated_at: p.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}
