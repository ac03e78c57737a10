//! Shared application state injected into every Axum handler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use hearth_core::chat::InferenceRelay;
use hearth_core::entities::{DEFAULT_MODEL_KEY, SettingsStore};
use hearth_core::{OllamaClient, SqliteStore};
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;

pub type ChatRelay = InferenceRelay<OllamaClient, SqliteStore>;

/// Abort handles of in-flight relays, keyed by conversation id.
///
/// A conversation can have several runs at once. Each handle carries the id
/// of its run, so a finishing relay removes only its own entry.
pub struct RelayRegistry {
    handles: Mutex<HashMap<String, Vec<(Uuid, AbortHandle)>>>,
}

impl std::fmt::Debug for RelayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .handles
            .lock()
            .map(|h| h.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0);
        write!(f, "RelayRegistry({count} relays)")
    }
}

impl Default for RelayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `relay` as its own task and track it under `conversation_id`.
    ///
    /// The entry is removed when the task finishes.
    pub fn spawn<F>(self: &Arc<Self>, conversation_id: String, relay: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let run_id = Uuid::new_v4();
        let registry = Arc::clone(self);
        let key = conversation_id.clone();
        // Held across the spawn so the task cannot deregister before it is
        // registered.
        let Ok(mut map) = self.handles.lock() else {
            tokio::spawn(relay);
            return;
        };
        let handle = tokio::spawn(async move {
            relay.await;
            registry.remove(&key, run_id);
        });
        map.entry(conversation_id)
            .or_default()
            .push((run_id, handle.abort_handle()));
    }

    /// Abort every running relay of a conversation. Returns `true` if any
    /// was found.
    pub fn abort(&self, conversation_id: &str) -> bool {
        let Ok(mut map) = self.handles.lock() else {
            return false;
        };
        let Some(runs) = map.remove(conversation_id) else {
            return false;
        };
        for (_, handle) in &runs {
            handle.abort();
        }
        if runs.len() > 1 {
            debug!(conversation_id, runs = runs.len(), "aborted concurrent relays");
        }
        true
    }

    #[cfg(test)]
    pub fn is_running(&self, conversation_id: &str) -> bool {
        self.handles
            .lock()
            .map(|map| map.contains_key(conversation_id))
            .unwrap_or(false)
    }

    fn remove(&self, conversation_id: &str, run_id: Uuid) {
        let Ok(mut map) = self.handles.lock() else {
            return;
        };
        let Some(runs) = map.get_mut(conversation_id) else {
            return;
        };
        runs.retain(|(id, _)| *id != run_id);
        if runs.is_empty() {
            map.remove(conversation_id);
        }
        debug!(conversation_id, "relay deregistered");
    }
}

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversations, turns, presets, profile and settings.
    pub store: Arc<SqliteStore>,
    /// Ollama client, also used directly for model listings.
    pub backend: Arc<OllamaClient>,
    pub relay: Arc<ChatRelay>,
    /// Tracks abort handles of running relays.
    pub relays: Arc<RelayRegistry>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, backend: OllamaClient) -> Self {
        let store = Arc::new(store);
        let backend = Arc::new(backend);
        let relay = Arc::new(InferenceRelay::new(Arc::clone(&backend), Arc::clone(&store)));
        Self {
            config: Arc::new(config),
            store,
            backend,
            relay,
            relays: Arc::new(RelayRegistry::new()),
        }
    }

    /// The requested model, else the `default_model` setting, else the
    /// configured default. Blank values count as missing.
    pub async fn resolve_model(&self, requested: Option<String>) -> Result<String, sqlx::Error> {
        if let Some(model) = requested.filter(|m| !m.trim().is_empty()) {
            return Ok(model);
        }
        let stored = self.store.get_setting(DEFAULT_MODEL_KEY).await?;
        Ok(stored
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.config.default_model.clone()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn finished_relay_is_deregistered() {
        let registry = Arc::new(RelayRegistry::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        registry.spawn("c1".into(), async move {
            let _ = rx.await;
        });
        assert!(registry.is_running("c1"));

        tx.send(()).unwrap();
        for _ in 0..50 {
            if !registry.is_running("c1") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay was not deregistered");
    }

    #[tokio::test]
    async fn abort_stops_the_task() {
        let registry = Arc::new(RelayRegistry::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        registry.spawn("c1".into(), async move {
            std::future::pending::<()>().await;
            drop(tx);
        });

        assert!(registry.abort("c1"));
        assert!(!registry.is_running("c1"));
        // The future was dropped, so the sender went with it.
        assert!(rx.await.is_err());
        assert!(!registry.abort("c1"));
    }

    #[tokio::test]
    async fn abort_reaches_every_run_of_a_conversation() {
        let registry = Arc::new(RelayRegistry::new());
        let (first_tx, first_rx) = tokio::sync::oneshot::channel::<()>();
        let (second_tx, second_rx) = tokio::sync::oneshot::channel::<()>();
        registry.spawn("c1".into(), async move {
            std::future::pending::<()>().await;
            drop(first_tx);
        });
        registry.spawn("c1".into(), async move {
            std::future::pending::<()>().await;
            drop(second_tx);
        });

        assert!(registry.abort("c1"));
        assert!(first_rx.await.is_err());
        assert!(second_rx.await.is_err());
        assert!(!registry.is_running("c1"));
    }

    #[tokio::test]
    async fn older_run_does_not_remove_newer_one() {
        let registry = Arc::new(RelayRegistry::new());
        let (first_tx, first_rx) = tokio::sync::oneshot::channel::<()>();
        registry.spawn("c1".into(), async move {
            let _ = first_rx.await;
        });
        registry.spawn("c1".into(), std::future::pending());

        first_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.is_running("c1"));
        assert!(registry.abort("c1"));
    }
}
