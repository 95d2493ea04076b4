//! Model-backed processor
//!
//! Asks the model for one narrowing question per turn until enough answers
//! have been collected, then asks it to draft the outline in markdown.

use super::{ProcessorError, ProcessorReply};
use crate::llm::{LlmMessage, LlmRequest, LlmService};
use crate::outline::{strip_code_fence, Outline};
use crate::runtime::AnswerProcessor;
use crate::state_machine::QaPair;
use async_trait::async_trait;
use std::sync::Arc;

/// Answers collected before the outline is drafted
pub const DEFAULT_QUESTIONS_BEFORE_OUTLINE: usize = 3;

const QUESTION_SYSTEM_PROMPT: &str = "You help a writer prepare the outline of a document they are about to write. \
Ask them questions to understand what kind of document they have in mind. \
Every question should narrow down the document further than the previous one. \
Ask exactly one question at a time and keep it short and direct.";

const OUTLINE_SYSTEM_PROMPT: &str = "Read the conversation below and draft an outline for the document the writer described. \
Write the outline in Markdown and express its structure with heading levels only; do not use bullet lists. \
Wherever the writer has to supply the actual content, write the placeholder \"🚧 TBD\". \
Below a placeholder you may add a sentence describing what that part should contain. \
Reply with the outline and nothing else.";

const QUESTION_MAX_TOKENS: u32 = 256;
const OUTLINE_MAX_TOKENS: u32 = 4096;

pub struct LlmAnswerProcessor {
    llm: Arc<dyn LlmService>,
    questions_before_outline: usize,
}

impl LlmAnswerProcessor {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            questions_before_outline: DEFAULT_QUESTIONS_BEFORE_OUTLINE,
        }
    }

    /// Number of answers after which the outline is produced (at least one)
    pub fn with_questions_before_outline(mut self, count: usize) -> Self {
        self.questions_before_outline = count.max(1);
        self
    }

    async fn ask_next_question(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError> {
        let request = LlmRequest {
            system: Some(QUESTION_SYSTEM_PROMPT.to_string()),
            messages: transcript
                .iter()
                .flat_map(|pair| {
                    [
                        LlmMessage::assistant(pair.question.clone()),
                        LlmMessage::user(pair.answer.clone()),
                    ]
                })
                .collect(),
            max_tokens: Some(QUESTION_MAX_TOKENS),
        };

        let response = self.llm.complete(&request).await?;
        let question = response.text.trim();
        if question.is_empty() {
            return Err(ProcessorError::model("Model returned an empty question"));
        }
        Ok(ProcessorReply::question(question))
    }

    async fn draft_outline(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError> {
        let request = LlmRequest {
            system: Some(OUTLINE_SYSTEM_PROMPT.to_string()),
            messages: vec![LlmMessage::user(render_transcript(transcript))],
            max_tokens: Some(OUTLINE_MAX_TOKENS),
        };

        let response = self.llm.complete(&request).await?;
        tracing::debug!(markdown = %response.text, "Outline drafted");
        let outline = Outline::from_markdown(strip_code_fence(&response.text))?;
        Ok(ProcessorReply::outline(outline))
    }
}

#[async_trait]
impl AnswerProcessor for LlmAnswerProcessor {
    async fn process(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError> {
        if transcript.len() >= self.questions_before_outline {
            self.draft_outline(transcript).await
        } else {
            self.ask_next_question(transcript).await
        }
    }
}

/// Render the conversation as quoted `assistant:`/`user:` lines
fn render_transcript(transcript: &[QaPair]) -> String {
    transcript
        .iter()
        .flat_map(|pair| {
            [
                format!("assistant: \"{}\"", pair.question),
                format!("user: \"{}\"", pair.answer),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}
