//! Development-time inspection of conversation transitions
//!
//! An [`Inspector`] is handed to the runtime at construction and receives a
//! side-channel stream of everything the controller does. Nothing is
//! inspected unless one is supplied.

use crate::state_machine::ConvState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// One record in the inspection stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionEvent {
    pub conversation_id: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: InspectionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InspectionKind {
    /// An event was accepted
    Transition {
        event: &'static str,
        from: ConvState,
        to: ConvState,
    },
    /// An event was refused in the current state
    Rejected { event: &'static str, reason: String },
    /// A processor failure or anomaly
    Error { message: String },
    /// The conversation reached its terminal state
    Complete,
}

impl InspectionEvent {
    pub fn new(conversation_id: impl Into<String>, kind: InspectionKind) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            at: Utc::now(),
            kind,
        }
    }
}

/// Receiver of inspection events
pub trait Inspector: Send + Sync {
    fn inspect(&self, event: InspectionEvent);
}

impl<T: Inspector + ?Sized> Inspector for Arc<T> {
    fn inspect(&self, event: InspectionEvent) {
        (**self).inspect(event);
    }
}

/// Writes every inspection event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInspector;

impl Inspector for TracingInspector {
    fn inspect(&self, event: InspectionEvent) {
        match &event.kind {
            InspectionKind::Transition { event: name, from, to } => tracing::debug!(
                conv_id = %event.conversation_id,
                event = name,
                from = from.name(),
                to = to.name(),
                "inspect: transition"
            ),
            InspectionKind::Rejected { event: name, reason } => tracing::debug!(
                conv_id = %event.conversation_id,
                event = name,
                reason = %reason,
                "inspect: rejected"
            ),
            InspectionKind::Error { message } => tracing::debug!(
                conv_id = %event.conversation_id,
                message = %message,
                "inspect: error"
            ),
            InspectionKind::Complete => {
                tracing::debug!(conv_id = %event.conversation_id, "inspect: complete");
            }
        }
    }
}

enum DeferredTarget {
    Pending(Vec<InspectionEvent>),
    Attached(Arc<dyn Inspector>),
}

/// Queues events until a real inspector attaches, then replays them in order.
///
/// Lets tooling that starts up after the conversation still see its full
/// history.
#[derive(Clone)]
pub struct DeferredInspector {
    target: Arc<Mutex<DeferredTarget>>,
}

impl DeferredInspector {
    pub fn new() -> Self {
        Self {
            target: Arc::new(Mutex::new(DeferredTarget::Pending(Vec::new()))),
        }
    }

    /// Attach the real inspector, flushing anything queued so far.
    ///
    /// Attaching again switches the target without replaying history.
    pub fn attach(&self, inspector: Arc<dyn Inspector>) {
        let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        if let DeferredTarget::Pending(queued) = &mut *target {
            let queued = std::mem::take(queued);
            tracing::debug!(count = queued.len(), "Flushing deferred inspection events");
            // Flush under the lock so new events cannot overtake the backlog
            for event in queued {
                inspector.inspect(event);
            }
        }
        *target = DeferredTarget::Attached(inspector);
    }

    pub fn is_attached(&self) -> bool {
        matches!(
            *self.target.lock().unwrap_or_else(PoisonError::into_inner),
            DeferredTarget::Attached(_)
        )
    }

    /// Number of events waiting for an inspector
    pub fn pending(&self) -> usize {
        match &*self.target.lock().unwrap_or_else(PoisonError::into_inner) {
            DeferredTarget::Pending(queued) => queued.len(),
            DeferredTarget::Attached(_) => 0,
        }
    }
}

impl Default for DeferredInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for DeferredInspector {
    fn inspect(&self, event: InspectionEvent) {
        let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *target {
            DeferredTarget::Pending(queued) => queued.push(event),
            DeferredTarget::Attached(inspector) => inspector.inspect(event),
        }
    }
}
