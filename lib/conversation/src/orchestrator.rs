//! The conversation turn loop.
//!
//! A run selects the thread and ordered messages of a [`Document`], seeds
//! the transcript with the resolved system context, then replays each
//! enabled message against the backend in order. Every call carries the
//! full transcript so far.
//!
//! Documents that cannot be interpreted (no thread, mistyped metadata) are
//! rejected before any event is emitted. Once the run has started, the
//! first error ends it: later messages are not processed, and outputs and
//! transcript turns produced so far are kept.

use crate::error::{RunError, RunErrorKind, ToolError};
use crate::event::{EventKind, EventLog, EventSink, JsonLinesSink, Level};
use crate::persist::ResponsePersister;
use crate::tool::ToolRegistry;
use crate::transcript::Transcript;
use odin_ai::{ChatMessage, LlmBackend, LlmRequest, LlmResponse};
use odin_core::RunId;
use odin_document::{Document, DocumentError, Message, TemplateVariables, Thread};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Records selected, nothing sent yet.
    #[default]
    Init,
    /// The system turn is in the transcript.
    SystemContextResolved,
    /// Working through the messages.
    MessageIterating,
    /// Every message was handled.
    Completed,
    /// A message or the system context failed.
    Errored,
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root for message output files.
    pub output_dir: PathBuf,
    /// Print each turn to stdout as it happens.
    pub echo: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            echo: false,
        }
    }
}

impl RunOptions {
    /// Creates options writing output under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Sets whether turns are printed.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Id tagging this run's events.
    pub run_id: RunId,
    /// The thread that was run.
    pub thread_id: String,
    /// Every turn of the conversation.
    pub transcript: Transcript,
    /// Files written for text turns, in message order.
    pub outputs: Vec<PathBuf>,
    /// The last response received, if any message was sent.
    pub last_response: Option<LlmResponse>,
    /// Messages sent to the backend.
    pub processed: usize,
    /// Disabled messages.
    pub skipped: usize,
}

/// Outcome of a failed run, with the progress made before the failure.
#[derive(Debug, Clone)]
pub struct RunFailure {
    /// Id tagging this run's events.
    pub run_id: RunId,
    /// Classification of `error`.
    pub kind: RunErrorKind,
    /// What ended the run.
    pub error: RunError,
    /// `None` when the document has no thread.
    pub thread_id: Option<String>,
    /// The message being processed when the run failed.
    pub message_id: Option<String>,
    /// The last state reached before the failure.
    pub reached: RunState,
    /// `None` when the run failed before the system context was resolved.
    pub transcript: Option<Transcript>,
    /// Files written before the failure. They are left on disk.
    pub outputs: Vec<PathBuf>,
}

impl RunFailure {
    fn before_loop(run_id: RunId, thread_id: Option<String>, error: DocumentError) -> Self {
        let error = RunError::from(error);
        Self {
            run_id,
            kind: error.kind(),
            error,
            thread_id,
            message_id: None,
            reached: RunState::Init,
            transcript: None,
            outputs: Vec::new(),
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Default)]
struct Progress {
    state: RunState,
    outputs: Vec<PathBuf>,
    last_response: Option<LlmResponse>,
    processed: usize,
    skipped: usize,
    current_message: Option<String>,
}

impl Progress {
    fn advance(&mut self, to: RunState) {
        debug!(from = ?self.state, to = ?to, "run state changed");
        self.state = to;
    }

    fn output_paths(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|p| p.display().to_string())
            .collect()
    }
}

/// Replays conversation documents against a backend.
///
/// The backend and tools are supplied by the caller and live as long as
/// the orchestrator; each [`Orchestrator::run`] builds a fresh transcript
/// and event log.
pub struct Orchestrator<B> {
    backend: B,
    tools: ToolRegistry,
    sinks: Vec<Arc<dyn EventSink>>,
    min_level: Level,
    thread_log: bool,
}

impl<B: LlmBackend> Orchestrator<B> {
    /// Creates an orchestrator with no event sinks.
    #[must_use]
    pub fn new(backend: B, tools: ToolRegistry) -> Self {
        Self {
            backend,
            tools,
            sinks: Vec::new(),
            min_level: Level::Debug,
            thread_log: true,
        }
    }

    /// Adds a sink that receives the events of every run.
    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Drops events below `level`.
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Sets whether events are also appended to the thread's `log_file`.
    #[must_use]
    pub fn with_thread_log(mut self, enabled: bool) -> Self {
        self.thread_log = enabled;
        self
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn event_log(&self, run_id: RunId, thread: &Thread) -> EventLog {
        let mut events = EventLog::new(run_id)
            .with_thread_id(thread.id.clone())
            .with_min_level(self.min_level);
        for sink in &self.sinks {
            events = events.with_sink(Arc::clone(sink));
        }
        if self.thread_log {
            if let Some(path) = &thread.log_file {
                events = events.with_sink(Arc::new(JsonLinesSink::new(path)));
            }
        }
        events
    }

    /// Runs every enabled message of `document` in order.
    ///
    /// `variables` are `key=value` template arguments applied to the thread
    /// and message content.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] describing the first error and the progress
    /// made before it.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, thread_id = tracing::field::Empty))]
    pub async fn run<S: AsRef<str>>(
        &self,
        document: &Document,
        variables: &[S],
        options: &RunOptions,
    ) -> Result<RunReport, RunFailure> {
        let run_id = RunId::new();
        let span = tracing::Span::current();
        span.record("run_id", tracing::field::display(run_id));

        let thread = document
            .thread()
            .map_err(|e| RunFailure::before_loop(run_id, None, e))?;
        span.record("thread_id", thread.id.as_str());
        let messages = document
            .messages()
            .map_err(|e| RunFailure::before_loop(run_id, Some(thread.id.clone()), e))?;

        let events = self.event_log(run_id, &thread);
        let mut progress = Progress::default();

        events.info(
            EventKind::ChatStarted,
            format!("chat started with {} messages", messages.len()),
            json!({
                "thread_id": thread.id,
                "messages": messages.len(),
                "output_dir": options.output_dir.display().to_string(),
            }),
        );

        let (variables, mut transcript) = match prepare(&thread, variables, &events) {
            Ok(prepared) => prepared,
            Err(error) => return Err(fail(&events, &thread, progress, None, error)),
        };
        progress.advance(RunState::SystemContextResolved);

        let outcome = self
            .drive(
                &thread,
                &messages,
                &variables,
                options,
                &events,
                &mut transcript,
                &mut progress,
            )
            .await;

        match outcome {
            Ok(()) => {
                progress.advance(RunState::Completed);
                events.info(
                    EventKind::ChatCompleted,
                    "chat completed",
                    json!({
                        "thread_id": thread.id,
                        "processed": progress.processed,
                        "skipped": progress.skipped,
                        "outputs": progress.output_paths(),
                    }),
                );
                Ok(RunReport {
                    run_id,
                    thread_id: thread.id,
                    transcript,
                    outputs: progress.outputs,
                    last_response: progress.last_response,
                    processed: progress.processed,
                    skipped: progress.skipped,
                })
            }
            Err(error) => Err(fail(&events, &thread, progress, Some(transcript), error)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        thread: &Thread,
        messages: &[Message],
        variables: &TemplateVariables,
        options: &RunOptions,
        events: &EventLog,
        transcript: &mut Transcript,
        progress: &mut Progress,
    ) -> Result<(), RunError> {
        let persister = ResponsePersister::new(&options.output_dir);
        progress.advance(RunState::MessageIterating);

        for message in messages {
            progress.current_message = Some(message.id.clone());

            if message.disabled {
                progress.skipped += 1;
                events.info(
                    EventKind::MessageSkipped,
                    format!("skipped disabled message {}", message.id),
                    json!({ "message_id": message.id, "thread_id": message.thread_id }),
                );
                echo(options, format!("Skipping message {}", message.id));
                continue;
            }

            events.info(
                EventKind::MessageStarted,
                format!("message {} started", message.id),
                json!({
                    "message_id": message.id,
                    "thread_id": message.thread_id,
                    "order": message.order,
                    "model": message.model,
                    "temperature": message.temperature,
                }),
            );

            let content = variables.resolve(&message.content);
            transcript.push(ChatMessage::user(content.clone()));
            events.debug(
                EventKind::MessageContentProcessed,
                format!("message {} content processed", message.id),
                json!({ "message_id": message.id, "content": content }),
            );
            echo(options, format!("[{}] {content}", message.id));

            let tool = match &message.response_handler {
                Some(name) => Some(
                    self.tools
                        .definition(name)
                        .cloned()
                        .ok_or_else(|| ToolError::NotFound { name: name.clone() })?,
                ),
                None => None,
            };

            let mut request = LlmRequest::new(&message.model, transcript.messages().to_vec())
                .with_temperature(message.temperature);
            if let Some(tool) = tool {
                request = request.with_tool(tool);
            }

            let response = self.backend.complete(&request).await?;
            progress.processed += 1;
            events.debug(
                EventKind::MessageResponseReceived,
                format!("message {} response received", message.id),
                json!({
                    "message_id": message.id,
                    "model": response.model,
                    "usage": response.usage,
                    "raw": response.raw,
                }),
            );

            if message.uses_tool() {
                self.execute_tool_calls(message, &response, options, events, transcript)?;
            } else {
                let text = response.content.clone().unwrap_or_default();
                transcript.push(ChatMessage::assistant(text.clone()));
                echo(options, format!("[{} response] {text}", message.id));

                let path = persister.save(message.output_path(&thread.id), &text)?;
                events.info(
                    EventKind::MessageOutputSaved,
                    format!("message {} output saved to {}", message.id, path.display()),
                    json!({ "message_id": message.id, "path": path.display().to_string() }),
                );
                progress.outputs.push(path);
            }

            events.debug(
                EventKind::MessageCompleted,
                format!("message {} completed", message.id),
                json!({ "message_id": message.id }),
            );
            progress.last_response = Some(response);
        }

        progress.current_message = None;
        Ok(())
    }

    fn execute_tool_calls(
        &self,
        message: &Message,
        response: &LlmResponse,
        options: &RunOptions,
        events: &EventLog,
        transcript: &mut Transcript,
    ) -> Result<(), RunError> {
        if response.tool_calls.is_empty() {
            if let Some(text) = &response.content {
                transcript.push(ChatMessage::assistant(text.clone()));
            }
            events.warning(
                EventKind::MessageResponseReceived,
                format!("message {} expected a tool call but got none", message.id),
                json!({
                    "message_id": message.id,
                    "response_handler": message.response_handler,
                }),
            );
            return Ok(());
        }

        transcript.push(ChatMessage::tool_request(response.tool_calls.clone()));
        for call in &response.tool_calls {
            let result = self.tools.dispatch(call)?;
            transcript.push(ChatMessage::tool_result(call, result.clone()));
            events.info(
                EventKind::MessageToolExecuted,
                format!("tool {} executed", call.function.name),
                json!({
                    "message_id": message.id,
                    "tool": call.function.name,
                    "call_id": call.id,
                    "result": result,
                }),
            );
            echo(options, format!("[{} tool] {} executed", message.id, call.function.name));
        }
        Ok(())
    }
}

fn prepare<S: AsRef<str>>(
    thread: &Thread,
    variables: &[S],
    events: &EventLog,
) -> Result<(TemplateVariables, Transcript), RunError> {
    let received: Vec<&str> = variables.iter().map(|v| v.as_ref()).collect();
    events.info(
        EventKind::ChatReceivedTemplateVariables,
        format!("received {} template variables", received.len()),
        json!({ "variables": received }),
    );
    let variables = TemplateVariables::parse(variables)?;

    let system = variables.resolve(&thread.content);
    events.debug(
        EventKind::ChatSystemContextProcessed,
        "system context processed",
        json!({ "content": system }),
    );
    Ok((variables, Transcript::new(system)))
}

fn fail(
    events: &EventLog,
    thread: &Thread,
    mut progress: Progress,
    transcript: Option<Transcript>,
    error: RunError,
) -> RunFailure {
    let reached = progress.state;
    progress.advance(RunState::Errored);
    let kind = error.kind();
    events.error(
        EventKind::ChatErrored,
        error.to_string(),
        json!({
            "thread_id": thread.id,
            "message_id": progress.current_message,
            "error_kind": kind.as_str(),
        }),
    );
    RunFailure {
        run_id: events.run_id(),
        kind,
        error,
        thread_id: Some(thread.id.clone()),
        message_id: progress.current_message,
        reached,
        transcript,
        outputs: progress.outputs,
    }
}

fn echo(options: &RunOptions, line: String) {
    if options.echo {
        println!("{line}\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;
    use crate::tool::{SAVE_FILE, builtin_tools};
    use async_trait::async_trait;
    use odin_ai::{LlmError, LlmProvider, MessageRole, ToolCall, ToolDefinition};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const NO_VARS: &[&str] = &[];

    /// Backend that answers from a fixed script and records requests.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<LlmResponse, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            }
        }

        fn requests(&self) -> Vec<LlmRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(LlmError::RequestFailed {
                        reason: "script exhausted".to_string(),
                    })
                })
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::OpenAiCompatible
        }
    }

    fn text(content: &str) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse::text("gpt-4", content))
    }

    fn document(messages: &str) -> Document {
        Document::parse(&format!(
            "---\nid: t1\ntype: thread\n---\nYou help {{user}}.\n{messages}"
        ))
        .expect("parse")
    }

    fn message(id: &str, extra: &str) -> String {
        format!("---\nid: {id}\ntype: message\n{extra}---\nAbout {{topic}} ({id}).\n")
    }

    fn orchestrator(
        replies: Vec<Result<LlmResponse, LlmError>>,
        tools: ToolRegistry,
    ) -> (Orchestrator<ScriptedBackend>, MemorySink) {
        let sink = MemorySink::new();
        let orchestrator =
            Orchestrator::new(ScriptedBackend::new(replies), tools).with_sink(sink.clone());
        (orchestrator, sink)
    }

    #[tokio::test]
    async fn replays_messages_and_persists_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&[message("m2", "order: 2\n"), message("m1", "order: 1\n")].concat());
        let (orchestrator, sink) =
            orchestrator(vec![text("first"), text("second")], ToolRegistry::new());

        let report = orchestrator
            .run(&doc, &["user=Ana", "topic=Rust"], &RunOptions::new(dir.path()))
            .await
            .expect("run");

        assert_eq!(report.processed, 2);
        assert_eq!(report.thread_id, "t1");
        assert_eq!(report.transcript.len(), 5);
        assert_eq!(
            report.transcript.messages()[0].content.as_deref(),
            Some("You help Ana.")
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("t1/m1.md")).expect("m1"),
            "first"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("t1/m2.md")).expect("m2"),
            "second"
        );
        assert_eq!(
            report.last_response.and_then(|r| r.content).as_deref(),
            Some("second")
        );

        let requests = orchestrator.backend().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(
            requests[0].messages[1].content.as_deref(),
            Some("About Rust (m1).")
        );
        assert!(requests[0].tool.is_none());

        let kinds = sink.kinds();
        assert_eq!(kinds.first(), Some(&EventKind::ChatStarted));
        assert_eq!(kinds.last(), Some(&EventKind::ChatCompleted));
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == EventKind::MessageOutputSaved)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn disabled_message_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", "disabled: true\n"));
        let (orchestrator, sink) = orchestrator(vec![], ToolRegistry::new());

        let report = orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .expect("run");

        assert_eq!(report.skipped, 1);
        assert_eq!(report.transcript.len(), 1);
        assert!(report.last_response.is_none());
        assert!(orchestrator.backend().requests().is_empty());
        assert!(!dir.path().join("t1").exists());
        let kinds = sink.kinds();
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == EventKind::MessageSkipped)
                .count(),
            1
        );
        assert_eq!(kinds.last(), Some(&EventKind::ChatCompleted));
    }

    #[tokio::test]
    async fn tool_call_appends_tool_turn_without_output_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", "response_handler: save_file\n"));
        let call = ToolCall::new(
            "call_1",
            SAVE_FILE,
            r#"{"path":"notes.md","content":"saved by tool"}"#,
        );
        let (orchestrator, sink) = orchestrator(
            vec![Ok(LlmResponse::tool_calls("gpt-4", vec![call]))],
            builtin_tools(dir.path()),
        );

        let report = orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .expect("run");

        assert_eq!(report.transcript.count_role(MessageRole::Tool), 1);
        assert_eq!(
            report.transcript.last().and_then(|m| m.tool_call_id.as_deref()),
            Some("call_1")
        );
        assert!(report.outputs.is_empty());
        assert!(!dir.path().join("t1/m1.md").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.md")).expect("notes"),
            "saved by tool"
        );

        let requests = orchestrator.backend().requests();
        assert_eq!(
            requests[0].tool.as_ref().map(|t| t.name.as_str()),
            Some(SAVE_FILE)
        );
        assert!(sink.kinds().contains(&EventKind::MessageToolExecuted));
    }

    #[tokio::test]
    async fn unknown_tool_call_errors_with_thread_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", "response_handler: echo\n"));
        let tools = ToolRegistry::new()
            .with_tool(ToolDefinition::new("echo", "Echoes"), |_| Ok(String::new()));
        let call = ToolCall::new("call_1", "missing", "{}");
        let (orchestrator, sink) =
            orchestrator(vec![Ok(LlmResponse::tool_calls("gpt-4", vec![call]))], tools);

        let failure = orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, RunErrorKind::ToolNotFound);
        assert_eq!(failure.reached, RunState::MessageIterating);
        assert_eq!(failure.message_id.as_deref(), Some("m1"));

        let errored = sink
            .events()
            .into_iter()
            .find(|e| e.kind == EventKind::ChatErrored)
            .expect("errored event");
        assert_eq!(errored.level, Level::Error);
        assert_eq!(errored.context["thread_id"], "t1");
        assert_eq!(errored.context["error_kind"], "tool_not_found");
    }

    #[tokio::test]
    async fn unregistered_response_handler_fails_before_calling_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", "response_handler: nope\n"));
        let (orchestrator, _sink) = orchestrator(vec![text("unused")], ToolRegistry::new());

        let failure = orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, RunErrorKind::ToolNotFound);
        assert!(orchestrator.backend().requests().is_empty());
    }

    #[tokio::test]
    async fn service_failure_stops_remaining_messages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(
            &[
                message("m1", "order: 1\n"),
                message("m2", "order: 2\n"),
                message("m3", "order: 3\n"),
            ]
            .concat(),
        );
        let service_error = LlmError::Status {
            status: 500,
            body: "overloaded".to_string(),
        };
        let (orchestrator, sink) = orchestrator(
            vec![text("one"), Err(service_error.clone()), text("three")],
            ToolRegistry::new(),
        );

        let failure = orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, RunErrorKind::Inference);
        assert_eq!(failure.to_string(), service_error.to_string());
        assert_eq!(failure.message_id.as_deref(), Some("m2"));
        assert_eq!(failure.outputs, vec![dir.path().join("t1/m1.md")]);
        assert_eq!(orchestrator.backend().requests().len(), 2);
        assert!(dir.path().join("t1/m1.md").exists());
        assert!(!dir.path().join("t1/m3.md").exists());

        let transcript = failure.transcript.expect("partial transcript");
        assert_eq!(transcript.len(), 4);
        assert_eq!(sink.kinds().last(), Some(&EventKind::ChatErrored));
    }

    #[tokio::test]
    async fn malformed_variable_errors_after_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", ""));
        let (orchestrator, sink) = orchestrator(vec![text("unused")], ToolRegistry::new());

        let failure = orchestrator
            .run(&doc, &["topic"], &RunOptions::new(dir.path()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, RunErrorKind::InvalidArgument);
        assert_eq!(failure.reached, RunState::Init);
        assert!(failure.transcript.is_none());
        assert!(orchestrator.backend().requests().is_empty());
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::ChatStarted,
                EventKind::ChatReceivedTemplateVariables,
                EventKind::ChatErrored,
            ]
        );
        let events = sink.events();
        assert_eq!(events[1].context["variables"], json!(["topic"]));
    }

    #[tokio::test]
    async fn missing_thread_fails_before_any_event() {
        let doc = Document::parse(&message("m1", "")).expect("parse");
        let (orchestrator, sink) = orchestrator(vec![], ToolRegistry::new());

        let failure = orchestrator
            .run(&doc, NO_VARS, &RunOptions::default())
            .await
            .unwrap_err();

        assert_eq!(failure.kind, RunErrorKind::MissingThread);
        assert!(failure.thread_id.is_none());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn invalid_metadata_fails_before_any_event() {
        let doc = document(&message("m1", "temperature: hot\n"));
        let (orchestrator, sink) = orchestrator(vec![], ToolRegistry::new());

        let failure = orchestrator
            .run(&doc, NO_VARS, &RunOptions::default())
            .await
            .unwrap_err();

        assert_eq!(failure.kind, RunErrorKind::InvalidMetadata);
        assert_eq!(failure.thread_id.as_deref(), Some("t1"));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn rerun_overwrites_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", "output_file: out/result.txt\n"));
        let options = RunOptions::new(dir.path());

        let (first, _) = orchestrator(vec![text("old")], ToolRegistry::new());
        first.run(&doc, NO_VARS, &options).await.expect("first run");
        let (second, _) = orchestrator(vec![text("new")], ToolRegistry::new());
        second.run(&doc, NO_VARS, &options).await.expect("second run");

        assert_eq!(
            std::fs::read_to_string(dir.path().join("out/result.txt")).expect("read"),
            "new"
        );
    }

    #[tokio::test]
    async fn tool_handler_without_tool_calls_keeps_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = document(&message("m1", "response_handler: save_file\n"));
        let (orchestrator, sink) =
            orchestrator(vec![text("I would rather not.")], builtin_tools(dir.path()));

        let report = orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .expect("run");

        assert!(report.outputs.is_empty());
        assert_eq!(report.transcript.count_role(MessageRole::Tool), 0);
        assert_eq!(report.transcript.count_role(MessageRole::Assistant), 1);
        assert!(sink.events().iter().any(|e| e.level == Level::Warning));
    }

    #[tokio::test]
    async fn thread_log_file_receives_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("logs/t1.log");
        let doc = Document::parse(&format!(
            "---\nid: t1\ntype: thread\nlog_file: '{}'\n---\nsys\n{}",
            log_path.display(),
            message("m1", "")
        ))
        .expect("parse");
        let (orchestrator, sink) = orchestrator(vec![text("ok")], ToolRegistry::new());

        orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .expect("run");

        let lines = std::fs::read_to_string(&log_path).expect("log file");
        assert_eq!(lines.lines().count(), sink.events().len());
    }

    #[tokio::test]
    async fn thread_log_can_be_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("t1.log");
        let doc = Document::parse(&format!(
            "---\nid: t1\ntype: thread\nlog_file: '{}'\n---\nsys\n",
            log_path.display()
        ))
        .expect("parse");
        let orchestrator =
            Orchestrator::new(ScriptedBackend::default(), ToolRegistry::new())
                .with_thread_log(false);

        orchestrator
            .run(&doc, NO_VARS, &RunOptions::new(dir.path()))
            .await
            .expect("run");

        assert!(!log_path.exists());
    }
}
