//! Trait abstractions for runtime I/O
//!
//! These traits are the seams between the controller and its collaborators
//! and let the executor be tested with mock implementations.

use crate::document::{DocumentError, FieldUpdate};
use crate::processor::{ProcessorError, ProcessorReply};
use crate::state_machine::QaPair;
use async_trait::async_trait;
use std::sync::Arc;

/// Decides, from the transcript so far, whether to ask again or finish.
///
/// The transcript always ends with the turn just submitted. Implementations
/// own the completion policy; the controller only looks at the reply shape.
#[async_trait]
pub trait AnswerProcessor: Send + Sync {
    async fn process(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError>;
}

/// Host document that receives the finished outline
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Apply a single field write
    async fn write_field(&self, update: &FieldUpdate) -> Result<(), DocumentError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AnswerProcessor + ?Sized> AnswerProcessor for Arc<T> {
    async fn process(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError> {
        (**self).process(transcript).await
    }
}

#[async_trait]
impl<T: DocumentSink + ?Sized> DocumentSink for Arc<T> {
    async fn write_field(&self, update: &FieldUpdate) -> Result<(), DocumentError> {
        (**self).write_field(update).await
    }
}
