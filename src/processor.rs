//! Answer processors: decide whether to ask another question or finish
//!
//! The controller only sees the [`AnswerProcessor`](crate::runtime::AnswerProcessor)
//! trait; this module holds the reply/error contract and the implementations
//! shipped with the crate.

mod model;
mod scripted;

pub use model::{LlmAnswerProcessor, DEFAULT_QUESTIONS_BEFORE_OUTLINE};
pub use scripted::ScriptedProcessor;

use crate::llm::{LlmError, LlmErrorKind};
use crate::outline::{Outline, OutlineError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of one processor call.
///
/// Well-formed replies carry exactly one of the two fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<Outline>,
}

impl ProcessorReply {
    /// Continue the conversation with another question
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            next_question: Some(question.into()),
            outline: None,
        }
    }

    /// Finish the conversation with an outline
    pub fn outline(outline: Outline) -> Self {
        Self {
            next_question: None,
            outline: Some(outline),
        }
    }

    /// The next question, if present and not blank
    pub fn usable_question(&self) -> Option<&str> {
        self.next_question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Ways a reply can break the "exactly one of" contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractViolation {
    #[error("processor reply carried both a next question and an outline")]
    BothQuestionAndOutline,
    #[error("processor reply carried neither a next question nor an outline")]
    EmptyReply,
}

/// Processor failure with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProcessorError {
    pub kind: ProcessorErrorKind,
    pub message: String,
}

impl ProcessorError {
    pub fn new(kind: ProcessorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Network, message)
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Model, message)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Conversion, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Timeout, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Unauthorized, message)
    }
}

impl From<ContractViolation> for ProcessorError {
    fn from(violation: ContractViolation) -> Self {
        Self::new(ProcessorErrorKind::ContractViolation, violation.to_string())
    }
}

impl From<OutlineError> for ProcessorError {
    fn from(err: OutlineError) -> Self {
        Self::conversion(format!("Could not build outline: {err}"))
    }
}

impl From<LlmError> for ProcessorError {
    fn from(err: LlmError) -> Self {
        match err.kind {
            LlmErrorKind::Network | LlmErrorKind::RateLimit | LlmErrorKind::ServerError => {
                Self::network(err.message)
            }
            LlmErrorKind::Auth => Self::unauthorized(err.message),
            LlmErrorKind::InvalidRequest | LlmErrorKind::Unknown => Self::model(err.message),
        }
    }
}

/// Error classification, used for logging and user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorErrorKind {
    /// Transport failure reaching the model
    Network,
    /// The model rejected the request or answered with nothing usable
    Model,
    /// The model's markdown could not be turned into an outline
    Conversion,
    /// No answer within the configured timeout
    Timeout,
    /// Credentials missing or refused
    Unauthorized,
    /// The reply broke the "exactly one of question/outline" contract
    ContractViolation,
}
