//! Outline Assistant terminal adapter
//!
//! Reads answers line by line from stdin and writes the finished outline into
//! a JSON document.

use outline_assistant::config::{Config, ProcessorKind};
use outline_assistant::document::JsonFileDocument;
use outline_assistant::inspect::{DeferredInspector, TracingInspector};
use outline_assistant::llm::{GeminiService, LoggingService};
use outline_assistant::processor::{LlmAnswerProcessor, ScriptedProcessor};
use outline_assistant::runtime::{
    AnswerProcessor, ConversationHandle, ConversationRuntime, ConversationUpdate,
};
use outline_assistant::state_machine::{ConvContext, ConversationState};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outline_assistant=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::from_env()?;

    let processor: Arc<dyn AnswerProcessor> = match config.processor {
        ProcessorKind::Llm => {
            let gemini = GeminiService::new(
                config.api_key.clone().unwrap_or_default(),
                config.model.clone(),
                config.gateway.as_deref(),
            )?;
            tracing::info!(model = %config.model, gateway = config.gateway.is_some(), "Using model processor");
            let llm = Arc::new(LoggingService::new(Arc::new(gemini)));
            Arc::new(
                LlmAnswerProcessor::new(llm)
                    .with_questions_before_outline(config.questions_before_outline),
            )
        }
        ProcessorKind::Scripted => {
            tracing::info!("Using scripted processor");
            Arc::new(ScriptedProcessor::default())
        }
    };

    let conversation_id = uuid::Uuid::new_v4().to_string();
    let context = ConvContext::new(&conversation_id).with_field_path(config.field_path.clone());
    let document = JsonFileDocument::new(config.document_path.clone());

    let mut runtime = ConversationRuntime::new(
        context,
        ConversationState::new(config.initial_question.clone()),
        processor,
        document,
    );
    if let Some(timeout) = config.processor_timeout {
        runtime = runtime.with_processor_timeout(timeout);
    }
    let inspector = config.inspect.then(DeferredInspector::new);
    if let Some(inspector) = &inspector {
        runtime = runtime.with_inspector(Arc::new(inspector.clone()));
    }

    let (handle, task) = runtime.spawn();
    let mut updates = handle.subscribe();
    if let Some(inspector) = &inspector {
        inspector.attach(Arc::new(TracingInspector));
    }
    tracing::info!(conv_id = %conversation_id, document = %config.document_path.display(), "Conversation started");

    interview(&handle, &mut updates).await?;

    handle.shutdown();
    let final_state = task.await?;
    let write_failed = drain_updates(&mut updates);

    match &final_state.produced_artifact {
        Some(outline) => {
            println!("\n{}", outline.to_markdown());
            if !write_failed {
                println!(
                    "Outline written to {} (field '{}')",
                    config.document_path.display(),
                    config.field_path
                );
            }
        }
        None => println!("\nConversation ended without an outline."),
    }

    Ok(())
}

/// Ask questions until the conversation completes or input ends
async fn interview(
    handle: &ConversationHandle,
    updates: &mut broadcast::Receiver<ConversationUpdate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let state = handle.snapshot();
        if state.is_terminal() {
            return Ok(());
        }

        println!("\n{}", state.current_question);
        if !state.current_answer.is_empty() {
            println!("(press Enter to retry: {})", state.current_answer);
        }
        print!("> ");
        std::io::stdout().flush()?;

        let line = unless_interrupted(lines.next_line(), tokio::signal::ctrl_c())
            .await
            .transpose()?
            .flatten();
        let Some(line) = line else {
            return Ok(());
        };

        // An empty line keeps the answer preserved from a failed attempt
        if !line.trim().is_empty() || state.current_answer.is_empty() {
            handle.edit_answer(line.trim()).await?;
        }
        let request_id = state.last_request_id + 1;
        handle.submit().await?;

        println!("Thinking...");
        let settled = handle.wait_for(|s| s.last_request_id >= request_id && !s.is_processing());
        if unless_interrupted(settled, tokio::signal::ctrl_c()).await.is_none() {
            println!("\nInterrupted.");
            return Ok(());
        }
        drain_updates(updates);
    }
}

/// Run `work` to completion unless `interrupt` resolves first
async fn unless_interrupted<T>(work: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        value = work => Some(value),
        _ = interrupt => None,
    }
}

/// Print failures since the last drain. Returns true if the document write failed.
fn drain_updates(updates: &mut broadcast::Receiver<ConversationUpdate>) -> bool {
    let mut write_failed = false;
    loop {
        match updates.try_recv() {
            Ok(ConversationUpdate::ProcessorFailed { message, .. }) => {
                eprintln!("Could not process your answer: {message}");
            }
            Ok(ConversationUpdate::Rejected { reason }) => eprintln!("{reason}"),
            Ok(ConversationUpdate::Error { message }) => {
                eprintln!("Error: {message}");
                write_failed = true;
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return write_failed,
        }
    }
}
