//! Environment-driven configuration for the terminal adapter

use crate::llm::DEFAULT_GEMINI_MODEL;
use crate::processor::DEFAULT_QUESTIONS_BEFORE_OUTLINE;
use crate::state_machine::state::{DEFAULT_FIELD_PATH, DEFAULT_INITIAL_QUESTION};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DOCUMENT_PATH: &str = "document.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive whole number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
    #[error("OUTLINE_PROCESSOR must be 'llm' or 'scripted', got '{0}'")]
    UnknownProcessor(String),
    #[error("No model credentials configured. Set GEMINI_API_KEY or LLM_GATEWAY, or use OUTLINE_PROCESSOR=scripted.")]
    MissingCredentials,
}

/// Which answer processor drives the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Gemini-backed questions and outline
    Llm,
    /// Canned follow-ups, no network
    Scripted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    /// Gateway URL that injects credentials itself
    pub gateway: Option<String>,
    pub model: String,
    pub processor: ProcessorKind,
    pub initial_question: String,
    pub questions_before_outline: usize,
    pub processor_timeout: Option<Duration>,
    pub document_path: PathBuf,
    pub field_path: String,
    pub inspect: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let processor = match get("OUTLINE_PROCESSOR").as_deref().map(str::trim) {
            None | Some("llm") => ProcessorKind::Llm,
            Some("scripted") => ProcessorKind::Scripted,
            Some(other) => return Err(ConfigError::UnknownProcessor(other.to_string())),
        };

        let api_key = get("GEMINI_API_KEY");
        let gateway = get("LLM_GATEWAY");
        if processor == ProcessorKind::Llm && api_key.is_none() && gateway.is_none() {
            return Err(ConfigError::MissingCredentials);
        }

        let questions_before_outline = match get("OUTLINE_QUESTIONS_BEFORE_OUTLINE") {
            Some(value) => parse_positive("OUTLINE_QUESTIONS_BEFORE_OUTLINE", &value)?,
            None => DEFAULT_QUESTIONS_BEFORE_OUTLINE,
        };

        let processor_timeout = get("OUTLINE_PROCESSOR_TIMEOUT_SECS")
            .map(|value| parse_positive("OUTLINE_PROCESSOR_TIMEOUT_SECS", &value))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            api_key,
            gateway,
            model: get("OUTLINE_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            processor,
            initial_question: get("OUTLINE_INITIAL_QUESTION")
                .unwrap_or_else(|| DEFAULT_INITIAL_QUESTION.to_string()),
            questions_before_outline,
            processor_timeout,
            document_path: get("OUTLINE_DOCUMENT_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DOCUMENT_PATH), PathBuf::from),
            field_path: get("OUTLINE_FIELD_PATH").unwrap_or_else(|| DEFAULT_FIELD_PATH.to_string()),
            inspect: get("OUTLINE_INSPECT")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        })
    }
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}
