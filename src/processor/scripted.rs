//! Offline processor with a fixed list of follow-up questions

use super::{ProcessorError, ProcessorReply};
use crate::outline::{Outline, OutlineSection, TBD_PLACEHOLDER};
use crate::runtime::AnswerProcessor;
use crate::state_machine::QaPair;
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_FOLLOW_UPS: [&str; 2] = ["Tell me more…", "Tell me more… (x2)"];

/// Asks each follow-up once, then builds an outline with one section per answer
pub struct ScriptedProcessor {
    follow_ups: Vec<String>,
    delay: Duration,
}

impl ScriptedProcessor {
    pub fn new(follow_ups: Vec<String>) -> Self {
        Self {
            follow_ups,
            delay: Duration::ZERO,
        }
    }

    /// Simulated latency before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for ScriptedProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_FOLLOW_UPS.iter().map(ToString::to_string).collect())
    }
}

#[async_trait]
impl AnswerProcessor for ScriptedProcessor {
    async fn process(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(question) = self.follow_ups.get(transcript.len().saturating_sub(1)) {
            return Ok(ProcessorReply::question(question.clone()));
        }

        let sections = transcript
            .iter()
            .map(|pair| {
                let answer = pair.answer.trim();
                let title = if answer.is_empty() { "Untitled section" } else { answer };
                OutlineSection::new(2, title)
                    .with_note(TBD_PLACEHOLDER)
                    .with_note(format!("Prompted by: {}", pair.question))
            })
            .collect();
        Ok(ProcessorReply::outline(Outline::new(sections)))
    }
}
