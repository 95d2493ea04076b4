//! Conversation state types

use crate::outline::Outline;
use serde::{Deserialize, Serialize};

/// Question asked when a conversation starts
pub const DEFAULT_INITIAL_QUESTION: &str = "What kind of document do you want to write?";

/// Field of the host document the outline is written into
pub const DEFAULT_FIELD_PATH: &str = "content";

// ============================================================================
// Transcript
// ============================================================================

/// One completed turn: the question asked and the answer given
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Append-only history of completed turns, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<QaPair>);

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pair: QaPair) {
        self.0.push(pair);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QaPair> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[QaPair] {
        &self.0
    }

    /// The transcript followed by one more, not yet recorded, turn
    pub fn with_turn(&self, pair: QaPair) -> Vec<QaPair> {
        let mut combined = Vec::with_capacity(self.0.len() + 1);
        combined.extend_from_slice(&self.0);
        combined.push(pair);
        combined
    }
}

impl From<Vec<QaPair>> for Transcript {
    fn from(pairs: Vec<QaPair>) -> Self {
        Self(pairs)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a QaPair;
    type IntoIter = std::slice::Iter<'a, QaPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Where the conversation is in its turn cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Waiting for the user to edit and submit an answer
    #[default]
    AwaitingInput,

    /// Answer submitted, processor call in flight
    Processing { request_id: u64 },

    /// Outline produced (terminal state)
    Completed,
}

impl ConvState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConvState::Completed)
    }

    pub fn name(self) -> &'static str {
        match self {
            ConvState::AwaitingInput => "awaiting_input",
            ConvState::Processing { .. } => "processing",
            ConvState::Completed => "completed",
        }
    }
}

/// Everything the controller owns about one conversation.
///
/// Cloned out as the read-only snapshot handed to presentation adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub status: ConvState,
    pub transcript: Transcript,
    /// Question shown to the user; empty only once completed
    pub current_question: String,
    /// Unsubmitted answer to `current_question`
    pub current_answer: String,
    /// Set exactly once, on entering `Completed`
    pub produced_artifact: Option<Outline>,
    /// Id of the most recently dispatched processor call
    pub last_request_id: u64,
}

impl ConversationState {
    /// Fresh conversation opening with `initial_question`; a blank question
    /// falls back to [`DEFAULT_INITIAL_QUESTION`]
    pub fn new(initial_question: impl Into<String>) -> Self {
        let mut current_question = initial_question.into();
        if current_question.trim().is_empty() {
            current_question = DEFAULT_INITIAL_QUESTION.to_string();
        }
        Self {
            status: ConvState::AwaitingInput,
            transcript: Transcript::new(),
            current_question,
            current_answer: String::new(),
            produced_artifact: None,
            last_request_id: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.status, ConvState::Processing { .. })
    }

    /// The turn that would be recorded if the current answer were accepted
    pub fn pending_turn(&self) -> QaPair {
        QaPair::new(self.current_question.clone(), self.current_answer.clone())
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_QUESTION)
    }
}

/// Immutable per-conversation configuration
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    /// Host-document field that receives the outline
    pub field_path: String,
}

impl ConvContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            field_path: DEFAULT_FIELD_PATH.to_string(),
        }
    }

    pub fn with_field_path(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = field_path.into();
        self
    }
}
