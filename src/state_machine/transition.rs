//! Pure state transition function
//!
//! Given the same state, context and event this always yields the same new
//! state and effects. All I/O happens in the runtime when effects execute.

use super::state::{ConvContext, ConvState, ConversationState};
use super::{Effect, Event};
use crate::processor::{ContractViolation, ProcessorError, ProcessorReply};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the controller refuses in its current state
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("An answer is already being processed")]
    Busy,
    #[error("The conversation is already complete")]
    Completed,
    #[error("Discarding stale processor result for request {request_id}")]
    StaleResult { request_id: u64 },
}

impl TransitionError {
    /// Rejections that are expected and should not be surfaced to the user
    pub fn is_silent(&self) -> bool {
        matches!(self, TransitionError::StaleResult { .. })
    }
}

pub fn transition(
    state: &ConversationState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state.status, event) {
        // ============================================================
        // Processor results
        // ============================================================

        // Only the in-flight request may resolve; anything else is a late
        // result from a superseded call.
        (
            ConvState::Processing { request_id: current },
            Event::ProcessorSucceeded { request_id, reply },
        ) if current == request_id => Ok(apply_reply(state, context, reply)),

        (
            ConvState::Processing { request_id: current },
            Event::ProcessorFailed { request_id, error },
        ) if current == request_id => {
            Ok(back_to_input(state).with_effect(Effect::report_failure(error)))
        }

        (
            _,
            Event::ProcessorSucceeded { request_id, .. }
            | Event::ProcessorFailed { request_id, .. },
        ) => Err(TransitionError::StaleResult { request_id }),

        // ============================================================
        // User input
        // ============================================================
        (ConvState::AwaitingInput, Event::AnswerEdited { text }) => {
            if text == state.current_answer {
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut next = state.clone();
            next.current_answer = text;
            Ok(TransitionResult::new(next).with_effect(Effect::PublishSnapshot))
        }

        (ConvState::AwaitingInput, Event::Submit) => {
            let mut next = state.clone();
            let request_id = state.last_request_id + 1;
            next.last_request_id = request_id;
            next.status = ConvState::Processing { request_id };
            let transcript = state.transcript.with_turn(state.pending_turn());
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishSnapshot)
                .with_effect(Effect::invoke_processor(request_id, transcript)))
        }

        (ConvState::Processing { .. }, Event::AnswerEdited { .. } | Event::Submit) => {
            Err(TransitionError::Busy)
        }

        (ConvState::Completed, Event::AnswerEdited { .. } | Event::Submit) => {
            Err(TransitionError::Completed)
        }
    }
}

/// Apply a successful reply. An outline always wins over a next question.
fn apply_reply(
    state: &ConversationState,
    context: &ConvContext,
    reply: ProcessorReply,
) -> TransitionResult {
    let next_question = reply.usable_question().map(str::to_string);
    let question_present = reply.next_question.is_some();

    if let Some(outline) = reply.outline {
        let mut next = state.clone();
        next.transcript.push(state.pending_turn());
        next.current_question.clear();
        next.current_answer.clear();
        next.produced_artifact = Some(outline.clone());
        next.status = ConvState::Completed;

        let anomaly = question_present.then_some(Effect::ReportAnomaly {
            violation: ContractViolation::BothQuestionAndOutline,
        });
        let transcript = next.transcript.as_slice().to_vec();
        return TransitionResult::new(next)
            .with_effects(anomaly)
            .with_effect(Effect::PublishSnapshot)
            .with_effect(Effect::ApplyArtifact {
                field_path: context.field_path.clone(),
                outline,
                transcript,
            });
    }

    let Some(question) = next_question else {
        let violation = ContractViolation::EmptyReply;
        return back_to_input(state)
            .with_effect(Effect::ReportAnomaly { violation })
            .with_effect(Effect::report_failure(ProcessorError::from(violation)));
    };

    let mut next = state.clone();
    next.transcript.push(state.pending_turn());
    next.current_question = question;
    next.current_answer.clear();
    next.status = ConvState::AwaitingInput;
    TransitionResult::new(next).with_effect(Effect::PublishSnapshot)
}

/// Return to input with the question and answer preserved for resubmission
fn back_to_input(state: &ConversationState) -> TransitionResult {
    let mut next = state.clone();
    next.status = ConvState::AwaitingInput;
    TransitionResult::new(next).with_effect(Effect::PublishSnapshot)
}
