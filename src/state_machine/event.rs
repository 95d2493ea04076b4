//! Events that can occur in a conversation

use crate::processor::{ProcessorError, ProcessorReply};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    AnswerEdited {
        text: String,
    },
    Submit,

    // Processor events
    ProcessorSucceeded {
        /// Id of the call that produced this reply
        request_id: u64,
        reply: ProcessorReply,
    },
    ProcessorFailed {
        request_id: u64,
        error: ProcessorError,
    },
}

impl Event {
    pub fn answer_edited(text: impl Into<String>) -> Self {
        Event::AnswerEdited { text: text.into() }
    }

    /// Short name for logs and inspection
    pub fn name(&self) -> &'static str {
        match self {
            Event::AnswerEdited { .. } => "answer_edited",
            Event::Submit => "submit",
            Event::ProcessorSucceeded { .. } => "processor_succeeded",
            Event::ProcessorFailed { .. } => "processor_failed",
        }
    }
}
