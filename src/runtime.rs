//! Runtime for executing conversations
//!
//! Each conversation runs as one task that consumes a single event queue:
//! user edits, submissions and processor results are applied strictly one at
//! a time, in arrival order.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::outline::Outline;
use crate::processor::ProcessorErrorKind;
use crate::state_machine::{ConversationState, Event, QaPair};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Updates pushed to presentation adapters
#[derive(Debug, Clone)]
pub enum ConversationUpdate {
    StateChanged {
        state: ConversationState,
    },
    /// An event was refused (e.g. submit while processing)
    Rejected {
        reason: String,
    },
    /// The processor call failed; the question and answer are still in place
    ProcessorFailed {
        message: String,
        kind: ProcessorErrorKind,
    },
    Completed {
        outline: Outline,
        transcript: Vec<QaPair>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Conversation runtime has stopped")]
    Closed,
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    conversation_id: String,
    event_tx: mpsc::Sender<Event>,
    snapshot_rx: watch::Receiver<ConversationState>,
    broadcast_tx: broadcast::Sender<ConversationUpdate>,
    shutdown: CancellationToken,
}

impl ConversationHandle {
    pub(crate) fn new(
        conversation_id: String,
        event_tx: mpsc::Sender<Event>,
        snapshot_rx: watch::Receiver<ConversationState>,
        broadcast_tx: broadcast::Sender<ConversationUpdate>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            conversation_id,
            event_tx,
            snapshot_rx,
            broadcast_tx,
            shutdown,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Queue an event for the conversation
    pub async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::Closed);
        }
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::Closed)
    }

    /// Replace the in-progress answer
    pub async fn edit_answer(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(Event::answer_edited(text)).await
    }

    /// Submit the current answer
    pub async fn submit(&self) -> Result<(), RuntimeError> {
        self.send(Event::Submit).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> ConversationState {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that tracks the latest published state
    pub fn watch(&self) -> watch::Receiver<ConversationState> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to conversation updates
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationUpdate> {
        self.broadcast_tx.subscribe()
    }

    /// Wait until the published state satisfies `predicate`.
    ///
    /// Returns the last published state if the runtime stops first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ConversationState) -> bool,
    ) -> ConversationState {
        let mut rx = self.watch();
        let settled = rx
            .wait_for(|state| predicate(state))
            .await
            .map(|state| (*state).clone());
        settled.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Tear the conversation down; an in-flight processor result is dropped
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.event_tx.is_closed()
    }
}
