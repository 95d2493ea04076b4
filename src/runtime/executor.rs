//! Conversation runtime executor

use super::traits::{AnswerProcessor, DocumentSink};
use super::{ConversationHandle, ConversationUpdate};

use crate::document::FieldUpdate;
use crate::inspect::{InspectionEvent, InspectionKind, Inspector};
use crate::outline::Outline;
use crate::processor::{ContractViolation, ProcessorError};
use crate::state_machine::{
    transition, ConvContext, ConversationState, Effect, Event, QaPair, TransitionError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_QUEUE_CAPACITY: usize = 32;
const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Drives one conversation: applies events in order and executes the
/// resulting effects against the processor and the host document.
pub struct ConversationRuntime<P, D>
where
    P: AnswerProcessor + 'static,
    D: DocumentSink + 'static,
{
    context: ConvContext,
    state: ConversationState,
    processor: Arc<P>,
    document: Arc<D>,
    inspector: Option<Arc<dyn Inspector>>,
    /// Upper bound on a single processor call; unbounded when unset
    processor_timeout: Option<Duration>,
    event_rx: mpsc::Receiver<Event>,
    /// Processor tasks post results through this; the queue closes once
    /// every handle is dropped
    event_tx: mpsc::WeakSender<Event>,
    /// Seeds handles until the loop starts
    handle_tx: Option<mpsc::Sender<Event>>,
    broadcast_tx: broadcast::Sender<ConversationUpdate>,
    snapshot_tx: watch::Sender<ConversationState>,
    /// Cancelled on teardown; in-flight processor calls hold a child token
    shutdown: CancellationToken,
}

impl<P, D> ConversationRuntime<P, D>
where
    P: AnswerProcessor + 'static,
    D: DocumentSink + 'static,
{
    pub fn new(context: ConvContext, state: ConversationState, processor: P, document: D) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(state.clone());

        Self {
            context,
            state,
            processor: Arc::new(processor),
            document: Arc::new(document),
            inspector: None,
            processor_timeout: None,
            event_rx,
            event_tx: event_tx.downgrade(),
            handle_tx: Some(event_tx),
            broadcast_tx,
            snapshot_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Send a side-channel record of every transition to `inspector`
    pub fn with_inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Fail processor calls that take longer than `timeout`
    pub fn with_processor_timeout(mut self, timeout: Duration) -> Self {
        self.processor_timeout = Some(timeout);
        self
    }

    pub fn handle(&self) -> ConversationHandle {
        // Closed queue: the handle reports Closed on first use
        let event_tx = self
            .handle_tx
            .clone()
            .or_else(|| self.event_tx.upgrade())
            .unwrap_or_else(|| mpsc::channel(1).0);

        ConversationHandle::new(
            self.context.conversation_id.clone(),
            event_tx,
            self.snapshot_tx.subscribe(),
            self.broadcast_tx.clone(),
            self.shutdown.clone(),
        )
    }

    /// Run on a new task
    pub fn spawn(self) -> (ConversationHandle, JoinHandle<ConversationState>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Process events until the conversation completes, is shut down, or
    /// every handle has been dropped.
    ///
    /// Returns the final state.
    pub async fn run(mut self) -> ConversationState {
        tracing::info!(
            conv_id = %self.context.conversation_id,
            state = self.state.status.name(),
            "Starting conversation runtime"
        );
        drop(self.handle_tx.take());

        while !self.state.is_terminal() {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    tracing::info!(conv_id = %self.context.conversation_id, "Conversation shut down");
                    break;
                }

                event = self.event_rx.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => {
                        tracing::info!(
                            conv_id = %self.context.conversation_id,
                            "All handles dropped"
                        );
                        break;
                    }
                },
            }
        }

        // Anything still in flight belongs to a conversation that no longer exists
        self.shutdown.cancel();
        tracing::info!(conv_id = %self.context.conversation_id, "Conversation runtime stopped");
        self.state
    }

    async fn process_event(&mut self, event: Event) {
        let event_name = event.name();

        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                self.reject(event_name, &e);
                return;
            }
        };

        let from = self.state.status;
        self.state = result.new_state;
        tracing::debug!(
            conv_id = %self.context.conversation_id,
            event = event_name,
            from = from.name(),
            to = self.state.status.name(),
            "Transition"
        );
        self.inspect(InspectionKind::Transition {
            event: event_name,
            from,
            to: self.state.status,
        });

        for effect in result.effects {
            self.execute_effect(effect).await;
        }

        if !from.is_terminal() && self.state.is_terminal() {
            self.inspect(InspectionKind::Complete);
        }
    }

    fn reject(&self, event_name: &'static str, error: &TransitionError) {
        if error.is_silent() {
            tracing::debug!(
                conv_id = %self.context.conversation_id,
                event = event_name,
                reason = %error,
                "Discarding event"
            );
        } else {
            tracing::info!(
                conv_id = %self.context.conversation_id,
                event = event_name,
                reason = %error,
                "Event rejected"
            );
            let _ = self.broadcast_tx.send(ConversationUpdate::Rejected {
                reason: error.to_string(),
            });
        }
        self.inspect(InspectionKind::Rejected {
            event: event_name,
            reason: error.to_string(),
        });
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::PublishSnapshot => self.publish_snapshot(),
            Effect::InvokeProcessor {
                request_id,
                transcript,
            } => self.spawn_processor_call(request_id, transcript),
            Effect::ReportFailure { error } => self.report_failure(&error),
            Effect::ReportAnomaly { violation } => self.report_anomaly(violation),
            Effect::ApplyArtifact {
                field_path,
                outline,
                transcript,
            } => self.apply_artifact(field_path, outline, transcript).await,
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.state.clone());
        let _ = self.broadcast_tx.send(ConversationUpdate::StateChanged {
            state: self.state.clone(),
        });
    }

    fn spawn_processor_call(&self, request_id: u64, transcript: Vec<QaPair>) {
        let processor = self.processor.clone();
        let event_tx = self.event_tx.clone();
        let cancel = self.shutdown.child_token();
        let timeout = self.processor_timeout;
        let conv_id = self.context.conversation_id.clone();

        tokio::spawn(async move {
            tracing::info!(
                conv_id = %conv_id,
                request_id,
                turns = transcript.len(),
                "Processing answer (background)"
            );

            let call = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, processor.process(&transcript))
                        .await
                        .unwrap_or_else(|_| {
                            Err(ProcessorError::timeout(format!(
                                "No reply within {}ms",
                                limit.as_millis()
                            )))
                        }),
                    None => processor.process(&transcript).await,
                }
            };

            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(conv_id = %conv_id, request_id, "Processor call abandoned");
                }

                result = call => {
                    let event = match result {
                        Ok(reply) => Event::ProcessorSucceeded { request_id, reply },
                        Err(error) => Event::ProcessorFailed { request_id, error },
                    };
                    let delivered = match event_tx.upgrade() {
                        Some(tx) => tx.send(event).await.is_ok(),
                        None => false,
                    };
                    if !delivered {
                        tracing::debug!(
                            conv_id = %conv_id,
                            request_id,
                            "Conversation gone, dropping result"
                        );
                    }
                }
            }
        });
    }

    fn report_failure(&self, error: &ProcessorError) {
        tracing::error!(
            conv_id = %self.context.conversation_id,
            kind = ?error.kind,
            error = %error,
            "Answer processing failed"
        );
        let _ = self.broadcast_tx.send(ConversationUpdate::ProcessorFailed {
            message: error.message.clone(),
            kind: error.kind,
        });
        self.inspect(InspectionKind::Error {
            message: error.to_string(),
        });
    }

    fn report_anomaly(&self, violation: ContractViolation) {
        tracing::warn!(
            conv_id = %self.context.conversation_id,
            violation = %violation,
            "Processor reply broke its contract"
        );
        self.inspect(InspectionKind::Error {
            message: violation.to_string(),
        });
    }

    async fn apply_artifact(&self, field_path: String, outline: Outline, transcript: Vec<QaPair>) {
        let update = FieldUpdate::outline(field_path, &outline);
        match self.document.write_field(&update).await {
            Ok(()) => tracing::info!(
                conv_id = %self.context.conversation_id,
                field = %update.path,
                sections = outline.sections.len(),
                "Outline applied to document"
            ),
            Err(e) => {
                tracing::error!(
                    conv_id = %self.context.conversation_id,
                    field = %update.path,
                    error = %e,
                    "Failed to write outline to document"
                );
                let _ = self.broadcast_tx.send(ConversationUpdate::Error {
                    message: e.to_string(),
                });
                self.inspect(InspectionKind::Error {
                    message: e.to_string(),
                });
            }
        }

        let _ = self
            .broadcast_tx
            .send(ConversationUpdate::Completed { outline, transcript });
    }

    fn inspect(&self, kind: InspectionKind) {
        if let Some(inspector) = &self.inspector {
            inspector.inspect(InspectionEvent::new(
                self.context.conversation_id.clone(),
                kind,
            ));
        }
    }
}
