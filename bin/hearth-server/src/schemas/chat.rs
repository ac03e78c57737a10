use hearth_core::chat::RelayEvent;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatTurnRequest {
    /// Omit (or send an empty string) to start a new conversation.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Defaults to the `default_model` setting.
    #[serde(default)]
    pub model: Option<String>,
    /// Preset text applied to this turn only.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// One server-sent event of a chat stream. Exactly one shape is sent per
/// event: `{token, conversation_id}`, `{done: true, conversation_id}` or
/// `{error}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatStreamEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RelayEvent> for ChatStreamEvent {
    fn from(event: RelayEvent) -> Self {
        let empty = Self {
            token: None,
            done: None,
            conversation_id: None,
            error: None,
        };
        match event {
            RelayEvent::Token {
                token,
                conversation_id,
            } => Self {
                token: Some(token),
                conversation_id: Some(conversation_id),
                ..empty
            },
            RelayEvent::Done { conversation_id } => Self {
                done: Some(true),
                conversation_id: Some(conversation_id),
                ..empty
            },
            RelayEvent::Error { error } => Self {
                error: Some(error),
                ..empty
            },
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn stream_events_serialize_to_wire_shapes() {
        let cases = [
            (
                RelayEvent::Token {
                    token: "Hel".into(),
                    conversation_id: "c".into(),
                },
                json!({"token": "Hel", "conversation_id": "c"}),
            ),
            (
                RelayEvent::Done {
                    conversation_id: "c".into(),
                },
                json!({"done": true, "conversation_id": "c"}),
            ),
            (
                RelayEvent::Error {
                    error: "boom".into(),
                },
                json!({"error": "boom"}),
            ),
        ];
        for (event, expected) in cases {
            let wire = serde_json::to_value(ChatStreamEvent::from(event)).unwrap();
            assert_eq!(wire, expected);
        }
    }
}
