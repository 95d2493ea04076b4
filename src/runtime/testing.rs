//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{ConversationHandle, ConversationRuntime, ConversationUpdate};
use crate::document::{DocumentError, FieldUpdate};
use crate::inspect::{InspectionEvent, Inspector};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, Usage};
use crate::outline::Outline;
use crate::processor::{ProcessorError, ProcessorReply};
use crate::state_machine::{ConvContext, ConversationState, QaPair};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock model that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful text response
    pub fn queue_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(LlmResponse {
            text: text.to_string(),
            usage: Usage::default(),
        }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLlmService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Answer Processor
// ============================================================================

/// Processor that returns queued replies, optionally after a delay
pub struct MockProcessor {
    replies: Mutex<VecDeque<Result<ProcessorReply, ProcessorError>>>,
    delay: Option<Duration>,
    /// Transcript passed to each call
    pub calls: Mutex<Vec<Vec<QaPair>>>,
    /// Notified when a call starts (for test synchronization)
    pub call_started: Arc<Notify>,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay: None,
            calls: Mutex::new(Vec::new()),
            call_started: Arc::new(Notify::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_reply(&self, reply: ProcessorReply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn queue_question(&self, question: &str) {
        self.queue_reply(ProcessorReply::question(question));
    }

    pub fn queue_outline(&self, outline: Outline) {
        self.queue_reply(ProcessorReply::outline(outline));
    }

    pub fn queue_error(&self, error: ProcessorError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_calls(&self) -> Vec<Vec<QaPair>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerProcessor for MockProcessor {
    async fn process(&self, transcript: &[QaPair]) -> Result<ProcessorReply, ProcessorError> {
        self.calls.lock().unwrap().push(transcript.to_vec());
        self.call_started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessorError::network("No mock reply queued")))
    }
}

// ============================================================================
// Recording Document
// ============================================================================

/// Document sink that keeps every write in memory
#[derive(Default)]
pub struct RecordingDocument {
    updates: Mutex<Vec<FieldUpdate>>,
    fail: bool,
}

impl RecordingDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document that refuses every write
    pub fn failing() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn updates(&self) -> Vec<FieldUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSink for RecordingDocument {
    async fn write_field(&self, update: &FieldUpdate) -> Result<(), DocumentError> {
        if self.fail {
            return Err(DocumentError::InvalidPath(update.path.clone()));
        }
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

// ============================================================================
// Recording Inspector
// ============================================================================

#[derive(Default)]
pub struct RecordingInspector {
    events: Mutex<Vec<InspectionEvent>>,
}

impl RecordingInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InspectionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Inspector for RecordingInspector {
    fn inspect(&self, event: InspectionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub handle: ConversationHandle,
    pub updates: broadcast::Receiver<ConversationUpdate>,
    pub processor: Arc<MockProcessor>,
    pub document: Arc<RecordingDocument>,
    pub inspector: Arc<RecordingInspector>,
    task: JoinHandle<ConversationState>,
}

pub struct TestRuntimeBuilder {
    conv_id: String,
    initial_question: Option<String>,
    processor: MockProcessor,
    document: RecordingDocument,
    timeout: Option<Duration>,
}

impl TestRuntime {
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder {
            conv_id: "test-conv".to_string(),
            initial_question: None,
            processor: MockProcessor::new(),
            document: RecordingDocument::new(),
            timeout: None,
        }
    }

    /// Runtime around `processor` with every other collaborator defaulted
    pub fn with_processor(processor: MockProcessor) -> Self {
        Self::builder().processor(processor).build()
    }

    /// Type `text` into the answer box and submit it
    pub async fn answer(&self, text: &str) {
        self.handle.edit_answer(text).await.expect("Failed to edit answer");
        self.handle.submit().await.expect("Failed to submit");
    }

    /// Answer and wait for the processor result to be applied
    pub async fn answer_and_wait(&self, text: &str) -> ConversationState {
        let next_request = self.handle.snapshot().last_request_id + 1;
        self.answer(text).await;
        self.wait_for_request(next_request).await
    }

    /// Wait until request `request_id` has been resolved
    pub async fn wait_for_request(&self, request_id: u64) -> ConversationState {
        tokio::time::timeout(
            Duration::from_secs(2),
            self.handle
                .wait_for(|s| s.last_request_id >= request_id && !s.is_processing()),
        )
        .await
        .expect("Timed out waiting for processor result")
    }

    /// Wait for an update matching `predicate`
    pub async fn wait_for_update(
        &mut self,
        predicate: impl Fn(&ConversationUpdate) -> bool,
    ) -> Option<ConversationUpdate> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.updates.recv()).await {
                Ok(Ok(update)) if predicate(&update) => return Some(update),
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                _ => continue,
            }
        }
        None
    }

    /// Wait for the runtime task to stop and return its final state
    pub async fn finish(self) -> ConversationState {
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .expect("Runtime did not stop")
            .expect("Runtime task panicked")
    }
}

impl TestRuntimeBuilder {
    pub fn processor(mut self, processor: MockProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn document(mut self, document: RecordingDocument) -> Self {
        self.document = document;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn initial_question(mut self, question: impl Into<String>) -> Self {
        self.initial_question = Some(question.into());
        self
    }

    pub fn build(self) -> TestRuntime {
        let processor = Arc::new(self.processor);
        let document = Arc::new(self.document);
        let inspector = Arc::new(RecordingInspector::new());

        let state = self
            .initial_question
            .map_or_else(ConversationState::default, ConversationState::new);
        let mut runtime = ConversationRuntime::new(
            ConvContext::new(self.conv_id),
            state,
            processor.clone(),
            document.clone(),
        )
        .with_inspector(inspector.clone());
        if let Some(timeout) = self.timeout {
            runtime = runtime.with_processor_timeout(timeout);
        }

        // Subscribe before the runtime starts so no update is missed
        let updates = runtime.handle().subscribe();
        let (handle, task) = runtime.spawn();

        TestRuntime {
            handle,
            updates,
            processor,
            document,
            inspector,
            task,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{DeferredInspector, InspectionKind};
    use crate::outline::OutlineSection;
    use crate::processor::ProcessorErrorKind;
    use crate::runtime::RuntimeError;
    use crate::state_machine::state::DEFAULT_INITIAL_QUESTION;
    use crate::state_machine::ConvState;

    fn outline() -> Outline {
        Outline::new(vec![
            OutlineSection::new(2, "Introduction").with_note("Why Rust"),
            OutlineSection::new(2, "Ownership"),
            OutlineSection::new(3, "Borrowing"),
        ])
    }

    #[tokio::test]
    async fn test_mock_processor() {
        let processor = MockProcessor::new();
        processor.queue_question("Next?");

        let turn = vec![QaPair::new("Q", "A")];
        let reply = processor.process(&turn).await.unwrap();
        assert_eq!(reply.next_question.as_deref(), Some("Next?"));
        assert_eq!(processor.recorded_calls(), vec![turn.clone()]);

        // Second call should fail (no more replies)
        assert!(processor.process(&turn).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_tracks_published_state() {
        let processor = MockProcessor::new();
        processor.queue_question("Who is the audience?");
        let rt = TestRuntime::with_processor(processor);
        let mut watch = rt.handle.watch();
        assert_eq!(watch.borrow().current_question, DEFAULT_INITIAL_QUESTION);

        rt.answer_and_wait("A blog post").await;

        assert!(watch.has_changed().unwrap());
        let state = watch.borrow_and_update().clone();
        assert_eq!(state.current_question, "Who is the audience?");
        assert_eq!(state.transcript.len(), 1);
    }

    /// A next question records the turn and clears the answer box
    #[tokio::test]
    async fn test_next_question_recorded() {
        let processor = MockProcessor::new();
        processor.queue_question("Who is the audience?");
        let rt = TestRuntime::with_processor(processor);

        let state = rt.answer_and_wait("A blog post about Rust").await;

        assert_eq!(state.status, ConvState::AwaitingInput);
        assert_eq!(
            state.transcript.as_slice(),
            &[QaPair::new(DEFAULT_INITIAL_QUESTION, "A blog post about Rust")]
        );
        assert_eq!(state.current_question, "Who is the audience?");
        assert_eq!(state.current_answer, "");
        assert_eq!(
            rt.processor.recorded_calls(),
            vec![vec![QaPair::new(DEFAULT_INITIAL_QUESTION, "A blog post about Rust")]]
        );
        assert!(rt.document.updates().is_empty());
    }

    /// Third answer yields an outline that is written to the document once
    #[tokio::test]
    async fn test_outline_completes_conversation() {
        let processor = MockProcessor::new();
        processor.queue_question("Who is the audience?");
        processor.queue_question("How long should it be?");
        processor.queue_outline(outline());
        let mut rt = TestRuntime::builder()
            .processor(processor)
            .initial_question("What are you writing?")
            .build();

        rt.answer_and_wait("A blog post").await;
        rt.answer_and_wait("Beginners").await;
        let state = rt.answer_and_wait("Short").await;

        assert_eq!(state.status, ConvState::Completed);
        assert_eq!(state.produced_artifact, Some(outline()));

        let completed = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::Completed { .. }))
            .await;
        let Some(ConversationUpdate::Completed {
            outline: produced,
            transcript,
        }) = completed
        else {
            panic!("Expected Completed update");
        };
        assert_eq!(produced, outline());
        assert_eq!(
            transcript,
            vec![
                QaPair::new("What are you writing?", "A blog post"),
                QaPair::new("Who is the audience?", "Beginners"),
                QaPair::new("How long should it be?", "Short"),
            ]
        );

        let updates = rt.document.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].path, "content");
        assert_eq!(updates[0].value, outline().to_rich_text());

        let processor = rt.processor.clone();
        let handle = rt.handle.clone();
        let final_state = rt.finish().await;
        assert!(final_state.is_terminal());
        assert_eq!(processor.call_count(), 3);
        assert_eq!(handle.submit().await, Err(RuntimeError::Closed));
    }

    /// A failed call restores the question and keeps the typed answer
    #[tokio::test]
    async fn test_failure_preserves_answer() {
        let processor = MockProcessor::new();
        processor.queue_error(ProcessorError::network("connection reset"));
        processor.queue_question("Who is the audience?");
        let mut rt = TestRuntime::with_processor(processor);

        let state = rt.answer_and_wait("A blog post").await;
        assert_eq!(state.status, ConvState::AwaitingInput);
        assert_eq!(state.current_question, DEFAULT_INITIAL_QUESTION);
        assert_eq!(state.current_answer, "A blog post");
        assert!(state.transcript.is_empty());

        let failed = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::ProcessorFailed { .. }))
            .await;
        assert!(matches!(
            failed,
            Some(ConversationUpdate::ProcessorFailed {
                kind: ProcessorErrorKind::Network,
                ..
            })
        ));

        // Retrying submits the preserved answer unchanged
        rt.handle.submit().await.unwrap();
        let state = rt.wait_for_request(2).await;
        assert_eq!(state.current_question, "Who is the audience?");
        assert_eq!(
            state.transcript.as_slice(),
            &[QaPair::new(DEFAULT_INITIAL_QUESTION, "A blog post")]
        );
        assert_eq!(rt.processor.recorded_calls()[0], rt.processor.recorded_calls()[1]);
    }

    /// Submitting twice while processing starts only one call
    #[tokio::test]
    async fn test_double_submit_single_invocation() {
        let processor = MockProcessor::new().with_delay(Duration::from_millis(100));
        processor.queue_question("Who is the audience?");
        processor.queue_question("unused");
        let mut rt = TestRuntime::with_processor(processor);

        rt.handle.edit_answer("A blog post").await.unwrap();
        rt.handle.submit().await.unwrap();
        rt.handle.submit().await.unwrap();
        rt.handle.edit_answer("changed my mind").await.unwrap();

        let state = rt.wait_for_request(1).await;
        assert_eq!(rt.processor.call_count(), 1);
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript.as_slice()[0].answer, "A blog post");
        assert_eq!(state.current_question, "Who is the audience?");

        let rejected = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::Rejected { .. }))
            .await;
        assert!(rejected.is_some());
    }

    #[tokio::test]
    async fn test_processor_timeout() {
        let processor = MockProcessor::new().with_delay(Duration::from_millis(500));
        processor.queue_question("Too late");
        let mut rt = TestRuntime::builder()
            .processor(processor)
            .timeout(Duration::from_millis(50))
            .build();

        let state = rt.answer_and_wait("A blog post").await;
        assert_eq!(state.status, ConvState::AwaitingInput);
        assert_eq!(state.current_question, DEFAULT_INITIAL_QUESTION);
        assert_eq!(state.current_answer, "A blog post");

        let failed = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::ProcessorFailed { .. }))
            .await;
        assert!(matches!(
            failed,
            Some(ConversationUpdate::ProcessorFailed {
                kind: ProcessorErrorKind::Timeout,
                ..
            })
        ));
    }

    /// A result arriving after teardown is never applied
    #[tokio::test]
    async fn test_shutdown_discards_late_result() {
        let processor = MockProcessor::new().with_delay(Duration::from_millis(200));
        processor.queue_outline(outline());
        let rt = TestRuntime::with_processor(processor);
        let started = rt.processor.call_started.clone();

        rt.answer("A blog post").await;
        started.notified().await;
        rt.handle.shutdown();

        let handle = rt.handle.clone();
        let document = rt.document.clone();
        let final_state = rt.finish().await;
        assert!(final_state.is_processing());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(document.updates().is_empty());
        assert!(handle.is_closed());
        assert_eq!(handle.edit_answer("more").await, Err(RuntimeError::Closed));
    }

    #[tokio::test]
    async fn test_dropping_all_handles_stops_idle_runtime() {
        let runtime = ConversationRuntime::new(
            ConvContext::new("idle-conv"),
            ConversationState::default(),
            MockProcessor::new(),
            RecordingDocument::new(),
        );
        let (handle, task) = runtime.spawn();
        drop(handle);

        let final_state = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("Runtime outlived its handles")
            .unwrap();
        assert_eq!(final_state.status, ConvState::AwaitingInput);
    }

    /// Dropping the last handle mid-call ends the session and abandons the call
    #[tokio::test]
    async fn test_dropping_all_handles_abandons_call() {
        let processor = MockProcessor::new().with_delay(Duration::from_millis(200));
        processor.queue_outline(outline());
        let rt = TestRuntime::with_processor(processor);
        let started = rt.processor.call_started.clone();

        rt.answer("A blog post").await;
        started.notified().await;

        let TestRuntime {
            handle,
            document,
            task,
            ..
        } = rt;
        drop(handle);

        let final_state = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("Runtime outlived its handles")
            .unwrap();
        assert!(final_state.is_processing());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(document.updates().is_empty());
    }

    #[tokio::test]
    async fn test_document_failure_still_completes() {
        let processor = MockProcessor::new();
        processor.queue_outline(outline());
        let mut rt = TestRuntime::builder()
            .processor(processor)
            .document(RecordingDocument::failing())
            .build();

        let state = rt.answer_and_wait("A blog post").await;
        assert!(state.is_terminal());

        let error = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::Error { .. }))
            .await;
        assert!(error.is_some());
        let completed = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::Completed { .. }))
            .await;
        assert!(completed.is_some());
    }

    #[tokio::test]
    async fn test_reply_with_both_fields_completes_with_anomaly() {
        let processor = MockProcessor::new();
        processor.queue_reply(ProcessorReply {
            next_question: Some("Anything else?".to_string()),
            outline: Some(outline()),
        });
        let rt = TestRuntime::with_processor(processor);

        let state = rt.answer_and_wait("A blog post").await;
        assert!(state.is_terminal());
        assert_eq!(state.produced_artifact, Some(outline()));

        let inspector = rt.inspector.clone();
        rt.finish().await;
        let errors: Vec<_> = inspector
            .events()
            .into_iter()
            .filter(|e| matches!(e.kind, InspectionKind::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_is_failure() {
        let processor = MockProcessor::new();
        processor.queue_reply(ProcessorReply::default());
        let mut rt = TestRuntime::with_processor(processor);

        let state = rt.answer_and_wait("A blog post").await;
        assert_eq!(state.status, ConvState::AwaitingInput);
        assert_eq!(state.current_answer, "A blog post");
        assert!(state.transcript.is_empty());

        let failed = rt
            .wait_for_update(|u| matches!(u, ConversationUpdate::ProcessorFailed { .. }))
            .await;
        assert!(matches!(
            failed,
            Some(ConversationUpdate::ProcessorFailed {
                kind: ProcessorErrorKind::ContractViolation,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_inspector_sees_transitions() {
        let processor = MockProcessor::new();
        processor.queue_question("Who is the audience?");
        let rt = TestRuntime::with_processor(processor);

        rt.answer_and_wait("A blog post").await;

        let transitions: Vec<_> = rt
            .inspector
            .events()
            .into_iter()
            .filter_map(|e| match e.kind {
                InspectionKind::Transition { event, from, to } => Some((event, from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                ("answer_edited", ConvState::AwaitingInput, ConvState::AwaitingInput),
                ("submit", ConvState::AwaitingInput, ConvState::Processing { request_id: 1 }),
                (
                    "processor_succeeded",
                    ConvState::Processing { request_id: 1 },
                    ConvState::AwaitingInput
                ),
            ]
        );
        assert!(rt
            .inspector
            .events()
            .iter()
            .all(|e| e.conversation_id == "test-conv"));
    }

    /// An inspector attached mid-conversation still receives the earlier history
    #[tokio::test]
    async fn test_deferred_inspector_replays_history() {
        let processor = Arc::new(MockProcessor::new());
        processor.queue_outline(outline());
        let deferred = DeferredInspector::new();

        let runtime = ConversationRuntime::new(
            ConvContext::new("deferred-conv"),
            ConversationState::default(),
            processor,
            RecordingDocument::new(),
        )
        .with_inspector(Arc::new(deferred.clone()));
        let (handle, task) = runtime.spawn();

        handle.edit_answer("A blog post").await.unwrap();
        handle.submit().await.unwrap();
        let final_state = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(final_state.is_terminal());
        assert!(deferred.pending() > 0);

        let recorder = Arc::new(RecordingInspector::new());
        deferred.attach(recorder.clone());

        let events = recorder.events();
        assert!(matches!(
            events.first().map(|e| &e.kind),
            Some(InspectionKind::Transition { event: "answer_edited", .. })
        ));
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(InspectionKind::Complete)
        ));
    }
}
