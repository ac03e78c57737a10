use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, reusable system-prompt fragment (`presets` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub prompt: String,
    /// Built-in presets are seeded on first start and cannot be deleted.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
