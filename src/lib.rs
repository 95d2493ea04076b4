//! Outline Assistant - interview-driven document outlines
//!
//! A conversation controller that asks the user a short series of questions,
//! hands each answer to an answer processor, and writes the resulting outline
//! into a host document.

pub mod config;
pub mod document;
pub mod inspect;
pub mod llm;
pub mod outline;
pub mod processor;
pub mod runtime;
pub mod state_machine;
