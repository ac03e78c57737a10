//! Context assembly: persist the user turn, then build the exact message
//! list sent to the backend.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::backend::ChatMessage;
use crate::chat::composer::compose;
use crate::entities::{Conversation, ProfileStore, SettingsStore, Turn, TurnStore, TurnTarget};
use crate::error::ChatError;

/// Titles of new conversations keep at most this many characters of the
/// first message.
pub const TITLE_MAX_CHARS: usize = 80;

/// A user turn as submitted by the client.
#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    /// `None` (or an empty string) starts a new conversation.
    pub conversation_id: Option<String>,
    pub message: String,
    pub model: String,
    /// Preset text for this turn only; never stored with the conversation.
    pub preset: Option<String>,
}

/// Everything the relay needs for one turn.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub conversation_id: String,
    /// `true` when this turn created the conversation.
    pub created: bool,
    pub user_turn: Turn,
    /// Optional system message followed by the whole transcript.
    pub messages: Vec<ChatMessage>,
}

/// Title for a conversation started by `message`.
pub fn conversation_title(message: &str) -> String {
    let mut chars = message.chars();
    let mut title: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        title.push_str("...");
    }
    title
}

/// Persist the user turn and assemble the backend context.
///
/// The user turn is committed before anything else happens, so it survives a
/// failed inference call. Validation failures return before any write.
pub async fn assemble<S>(store: &S, request: AssembleRequest) -> Result<AssembledContext, ChatError>
where
    S: TurnStore + ProfileStore + SettingsStore,
{
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    let target = match request.conversation_id.filter(|id| !id.is_empty()) {
        Some(id) => TurnTarget::Existing(id),
        None => {
            let now = Utc::now();
            TurnTarget::New(Conversation {
                id: Uuid::new_v4().to_string(),
                title: conversation_title(message),
                model: request.model.clone(),
                created_at: now,
                updated_at: now,
            })
        }
    };
    let created = matches!(target, TurnTarget::New(_));
    let conversation_id = target.conversation_id().to_owned();

    let user_turn = store
        .append_user_turn(&target, message)
        .await?
        .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;

    let history = store.list_turns(&conversation_id).await?;

    // Re-read on every turn so settings changes apply without a restart.
    let profile_enabled = store.profile_enabled().await?;
    let profile = if profile_enabled {
        store.get_profile().await?.content
    } else {
        String::new()
    };
    let system_prompt = compose(
        profile_enabled,
        &profile,
        request.preset.as_deref().unwrap_or_default(),
    );

    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.extend(
        history
            .into_iter()
            .map(|turn| ChatMessage::new(turn.role, turn.content)),
    );

    debug!(
        conversation_id = %conversation_id,
        created,
        messages = messages.len(),
        "assembled chat context"
    );

    Ok(AssembledContext {
        conversation_id,
        created,
        user_turn,
        messages,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{
        ConversationStore, PROFILE_ENABLED_KEY, Role, test_support,
    };

    fn request(conversation_id: Option<&str>, message: &str, preset: Option<&str>) -> AssembleRequest {
        AssembleRequest {
            conversation_id: conversation_id.map(str::to_owned),
            message: message.into(),
            model: "test-model".into(),
            preset: preset.map(str::to_owned),
        }
    }

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(conversation_title("hello"), "hello");
        let exact = "x".repeat(TITLE_MAX_CHARS);
        assert_eq!(conversation_title(&exact), exact);
    }

    #[test]
    fn long_titles_are_truncated_by_characters() {
        let long = "é".repeat(TITLE_MAX_CHARS + 5);
        let title = conversation_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn whitespace_message_is_rejected_without_writes() {
        let (store, _dir) = test_support::store().await;
        let err = assemble(&store, request(None, " \n\t ", None)).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_turn_creates_conversation() {
        let (store, _dir) = test_support::store().await;
        store.set_profile("").await.unwrap();

        let ctx = assemble(&store, request(None, "  What is Rust?  ", None))
            .await
            .unwrap();
        assert!(ctx.created);
        assert_eq!(ctx.messages, vec![ChatMessage::user("What is Rust?")]);

        let conversation = store.get_conversation(&ctx.conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.title, "What is Rust?");
        assert_eq!(conversation.model, "test-model");
        assert_eq!(ctx.user_turn.role, Role::User);
    }

    #[tokio::test]
    async fn unknown_conversation_is_rejected() {
        let (store, _dir) = test_support::store().await;
        let err = assemble(&store, request(Some("missing"), "hi", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ConversationNotFound(id) if id == "missing"));
        assert!(store.list_turns("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_is_system_then_history_then_new_turn() {
        let (store, _dir) = test_support::store().await;
        store.set_profile("P").await.unwrap();

        let first = assemble(&store, request(None, "one", None)).await.unwrap();
        let id = first.conversation_id.clone();
        store.append_turn(&id, Role::Assistant, "two").await.unwrap();

        let ctx = assemble(&store, request(Some(&id), "three", Some("Be concise.")))
            .await
            .unwrap();
        assert!(!ctx.created);
        assert_eq!(
            ctx.messages,
            vec![
                ChatMessage::system("P\n\n---\n\nBe concise."),
                ChatMessage::user("one"),
                ChatMessage::assistant("two"),
                ChatMessage::user("three"),
            ]
        );
    }

    #[tokio::test]
    async fn profile_toggle_is_read_per_turn() {
        let (store, _dir) = test_support::store().await;
        store.set_profile("P").await.unwrap();
        let ctx = assemble(&store, request(None, "a", None)).await.unwrap();
        assert_eq!(ctx.messages[0], ChatMessage::system("P"));

        store.set_setting(PROFILE_ENABLED_KEY, "false").await.unwrap();
        let ctx = assemble(&store, request(Some(&ctx.conversation_id), "b", None))
            .await
            .unwrap();
        assert_eq!(ctx.messages[0], ChatMessage::user("a"));
        assert_eq!(ctx.messages.len(), 2);
    }

    #[tokio::test]
    async fn empty_conversation_id_starts_a_new_conversation() {
        let (store, _dir) = test_support::store().await;
        let ctx = assemble(&store, request(Some(""), "hi", None)).await.unwrap();
        assert!(ctx.created);
        assert!(!ctx.conversation_id.is_empty());
    }
}
