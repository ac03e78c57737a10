//! Streaming inference relay.
//!
//! One [`InferenceRelay::run`] call drives a single turn through
//! `Idle → SendingRequest → Streaming → Completing → Done`. Backend failures
//! end in `Failed` with exactly one error event; a client that goes away ends
//! the turn in `Cancelled`. Only a completed reply is written to the store.
//!
//! The relay and the client are coupled through a bounded channel: each
//! backend line produces at most one outbound event, and the next line is not
//! read until that event has been accepted.

use std::sync::Arc;

use futures::StreamExt;
use strum::Display;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::backend::{BackendError, ChatOptions, ChatRequest, InferenceBackend};
use crate::chat::assembler::AssembledContext;
use crate::entities::{Role, Turn, TurnStore};

/// Stop sequences that keep the model from writing the user's next turn.
pub const DEFAULT_STOP_SEQUENCES: [&str; 4] = ["User", "User:", "Assistant:", "\nUser"];

/// Capacity of the relay → client channel.
pub const RELAY_BUFFER: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RelayState {
    Idle,
    SendingRequest,
    Streaming,
    Completing,
    Done,
    Failed,
    Cancelled,
}

/// A unit pushed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Token {
        token: String,
        conversation_id: String,
    },
    Done {
        conversation_id: String,
    },
    Error {
        error: String,
    },
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub state: RelayState,
    /// Fragments forwarded to the client.
    pub fragments: usize,
    /// The stored reply; only set when the backend completed the turn.
    pub assistant_turn: Option<Turn>,
}

/// Open a relay → client channel.
pub fn channel() -> (mpsc::Sender<RelayEvent>, mpsc::Receiver<RelayEvent>) {
    mpsc::channel(RELAY_BUFFER)
}

#[derive(Debug)]
pub struct InferenceRelay<B, S> {
    backend: Arc<B>,
    store: Arc<S>,
    stop: Vec<String>,
}

impl<B, S> InferenceRelay<B, S>
where
    B: InferenceBackend,
    S: TurnStore,
{
    pub fn new(backend: Arc<B>, store: Arc<S>) -> Self {
        Self {
            backend,
            store,
            stop: DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Relay one turn to the backend and its reply to `sink`.
    ///
    /// Never returns an error: every failure is reported to the client as a
    /// single [`RelayEvent::Error`] and reflected in the outcome state.
    pub async fn run(
        &self,
        model: &str,
        context: AssembledContext,
        sink: mpsc::Sender<RelayEvent>,
    ) -> RelayOutcome {
        let span = info_span!(
            "relay",
            conversation_id = %context.conversation_id,
            model = %model,
        );
        self.run_turn(model, context, sink).instrument(span).await
    }

    async fn run_turn(
        &self,
        model: &str,
        context: AssembledContext,
        sink: mpsc::Sender<RelayEvent>,
    ) -> RelayOutcome {
        let mut turn = TurnProgress::new(context.conversation_id);

        turn.enter(RelayState::SendingRequest);
        let request = ChatRequest {
            model: model.to_owned(),
            messages: context.messages,
            stream: true,
            options: ChatOptions {
                stop: self.stop.clone(),
            },
        };
        let opened = tokio::select! {
            biased;
            _ = sink.closed() => return turn.cancelled(),
            opened = self.backend.chat_stream(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return turn.fail(&sink, &e).await,
        };

        turn.enter(RelayState::Streaming);
        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => return turn.cancelled(),
                next = stream.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return turn.fail(&sink, &e).await,
                None => return turn.truncated(),
            };
            if let Some(fragment) = chunk.fragment() {
                turn.fragments.push(fragment.to_owned());
                let event = RelayEvent::Token {
                    token: fragment.to_owned(),
                    conversation_id: turn.conversation_id.clone(),
                };
                if sink.send(event).await.is_err() {
                    return turn.cancelled();
                }
            }
            if chunk.done {
                break;
            }
        }
        // Release the backend connection before touching the store.
        drop(stream);

        turn.enter(RelayState::Completing);
        let reply = turn.fragments.concat();
        match self
            .store
            .append_turn(&turn.conversation_id, Role::Assistant, &reply)
            .await
        {
            Ok(saved) => {
                let _ = sink
                    .send(RelayEvent::Done {
                        conversation_id: turn.conversation_id.clone(),
                    })
                    .await;
                turn.enter(RelayState::Done);
                info!(
                    fragments = turn.fragments.len(),
                    reply_len = reply.len(),
                    turn_id = saved.id,
                    "assistant reply saved"
                );
                RelayOutcome {
                    state: RelayState::Done,
                    fragments: turn.fragments.len(),
                    assistant_turn: Some(saved),
                }
            }
            Err(e) => {
                error!(error = %e, "failed to save assistant reply");
                turn.fail_with(&sink, "failed to save the assistant reply".to_owned())
                    .await
            }
        }
    }
}

/// Book-keeping for one turn in flight.
struct TurnProgress {
    conversation_id: String,
    state: RelayState,
    fragments: Vec<String>,
}

impl TurnProgress {
    fn new(conversation_id: String) -> Self {
        Self {
            conversation_id,
            state: RelayState::Idle,
            fragments: Vec::new(),
        }
    }

    fn enter(&mut self, next: RelayState) {
        debug!(from = %self.state, to = %next, "relay state change");
        self.state = next;
    }

    fn outcome(&self) -> RelayOutcome {
        RelayOutcome {
            state: self.state,
            fragments: self.fragments.len(),
            assistant_turn: None,
        }
    }

    fn cancelled(&mut self) -> RelayOutcome {
        info!(
            during = %self.state,
            fragments = self.fragments.len(),
            "client went away; partial reply discarded"
        );
        self.enter(RelayState::Cancelled);
        self.outcome()
    }

    fn truncated(&mut self) -> RelayOutcome {
        warn!(
            fragments = self.fragments.len(),
            "backend closed the stream without completing; reply not saved"
        );
        self.enter(RelayState::Done);
        self.outcome()
    }

    async fn fail(&mut self, sink: &mpsc::Sender<RelayEvent>, e: &BackendError) -> RelayOutcome {
        if e.is_unreachable() {
            warn!(error = %e, during = %self.state, "backend unreachable");
        } else {
            error!(error = %e, during = %self.state, "backend request failed");
        }
        self.fail_with(sink, e.to_string()).await
    }

    async fn fail_with(&mut self, sink: &mpsc::Sender<RelayEvent>, message: String) -> RelayOutcome {
        self.enter(RelayState::Failed);
        // The client may already be gone; nothing else to do then.
        let _ = sink.send(RelayEvent::Error { error: message }).await;
        self.outcome()
    }
}
