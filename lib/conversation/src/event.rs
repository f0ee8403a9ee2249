//! Structured run events.
//!
//! Every milestone of a run is recorded as an [`Event`] and handed to each
//! configured [`EventSink`]. Sinks are best-effort: a failing sink is
//! reported through `tracing` and the run carries on.

use crate::error::SinkError;
use chrono::{DateTime, Utc};
use odin_core::{Envelope, RunId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Event severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Step-by-step detail, including raw responses.
    #[default]
    Debug,
    /// Normal milestones.
    Info,
    /// Something unexpected that did not stop the run.
    Warning,
    /// The run failed.
    Error,
    /// Reserved for failures outside a single run.
    Critical,
}

impl Level {
    /// Returns the lowercase name of this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "chat.started")]
    ChatStarted,
    #[serde(rename = "chat.received_template_variables")]
    ChatReceivedTemplateVariables,
    #[serde(rename = "chat.system_context_processed")]
    ChatSystemContextProcessed,
    #[serde(rename = "message.started")]
    MessageStarted,
    #[serde(rename = "message.skipped")]
    MessageSkipped,
    #[serde(rename = "message.content_processed")]
    MessageContentProcessed,
    #[serde(rename = "message.response_received")]
    MessageResponseReceived,
    #[serde(rename = "message.tool_executed")]
    MessageToolExecuted,
    #[serde(rename = "message.output_saved")]
    MessageOutputSaved,
    #[serde(rename = "message.completed")]
    MessageCompleted,
    #[serde(rename = "chat.completed")]
    ChatCompleted,
    #[serde(rename = "chat.errored")]
    ChatErrored,
}

impl EventKind {
    /// Returns the dotted name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatStarted => "chat.started",
            Self::ChatReceivedTemplateVariables => "chat.received_template_variables",
            Self::ChatSystemContextProcessed => "chat.system_context_processed",
            Self::MessageStarted => "message.started",
            Self::MessageSkipped => "message.skipped",
            Self::MessageContentProcessed => "message.content_processed",
            Self::MessageResponseReceived => "message.response_received",
            Self::MessageToolExecuted => "message.tool_executed",
            Self::MessageOutputSaved => "message.output_saved",
            Self::MessageCompleted => "message.completed",
            Self::ChatCompleted => "chat.completed",
            Self::ChatErrored => "chat.errored",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped run event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Which milestone this is.
    pub kind: EventKind,
    /// Run that emitted the event.
    pub run_id: RunId,
    /// Thread being run, once known.
    pub thread_id: Option<String>,
    /// Human-readable summary.
    pub message: String,
    /// Kind-specific structured fields.
    pub context: JsonValue,
}

/// Destination for run events.
pub trait EventSink: Send + Sync {
    /// Short name used when reporting failures.
    fn name(&self) -> &'static str;

    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be recorded.
    fn emit(&self, event: &Event) -> Result<(), SinkError>;
}

/// Appends one versioned JSON envelope per event to a file.
///
/// The file and its parent directories are created on first write.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonLinesSink {
    /// Creates a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: &std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }

    fn open(&self) -> Result<File, SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(&e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(&e))
    }
}

impl EventSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "json_lines"
    }

    fn emit(&self, event: &Event) -> Result<(), SinkError> {
        let line = Envelope::new(event)
            .to_json_line()
            .map_err(|e| SinkError::Encode {
                reason: e.to_string(),
            })?;

        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = match guard.take() {
            Some(file) => file,
            None => self.open()?,
        };
        let written = writeln!(file, "{line}").map_err(|e| self.io_error(&e));
        *guard = Some(file);
        written
    }
}

/// Mirrors events into `tracing` diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn emit(&self, event: &Event) -> Result<(), SinkError> {
        let thread_id = event.thread_id.as_deref().unwrap_or_default();
        macro_rules! forward {
            ($macro:ident) => {
                tracing::$macro!(
                    kind = %event.kind,
                    run_id = %event.run_id,
                    thread_id,
                    context = %event.context,
                    "{}",
                    event.message
                )
            };
        }
        match event.level {
            Level::Debug => forward!(debug),
            Level::Info => forward!(info),
            Level::Warning => forward!(warn),
            Level::Error | Level::Critical => forward!(error),
        }
        Ok(())
    }
}

/// Keeps events in memory.
///
/// Clones share the same buffer, so a caller can keep one handle and give
/// another to an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the kinds of the recorded events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.kind)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn emit(&self, event: &Event) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Event emitter for a single run.
#[derive(Clone)]
pub struct EventLog {
    run_id: RunId,
    thread_id: Option<String>,
    min_level: Level,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sinks: Vec<_> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("EventLog")
            .field("run_id", &self.run_id)
            .field("thread_id", &self.thread_id)
            .field("min_level", &self.min_level)
            .field("sinks", &sinks)
            .finish()
    }
}

impl EventLog {
    /// Creates a log for `run_id` with no sinks.
    #[must_use]
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            thread_id: None,
            min_level: Level::default(),
            sinks: Vec::new(),
        }
    }

    /// Tags every event with `thread_id`.
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Drops events below `level`.
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Adds a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the run this log belongs to.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Records an event in every sink.
    pub fn log(&self, level: Level, kind: EventKind, message: impl Into<String>, context: JsonValue) {
        if level < self.min_level {
            return;
        }
        let event = Event {
            timestamp: Utc::now(),
            level,
            kind,
            run_id: self.run_id,
            thread_id: self.thread_id.clone(),
            message: message.into(),
            context,
        };
        for sink in &self.sinks {
            if let Err(e) = sink.emit(&event) {
                tracing::warn!(sink = sink.name(), kind = %kind, error = %e, "event sink failed");
            }
        }
    }

    /// Records a `debug` event.
    pub fn debug(&self, kind: EventKind, message: impl Into<String>, context: JsonValue) {
        self.log(Level::Debug, kind, message, context);
    }

    /// Records an `info` event.
    pub fn info(&self, kind: EventKind, message: impl Into<String>, context: JsonValue) {
        self.log(Level::Info, kind, message, context);
    }

    /// Records a `warning` event.
    pub fn warning(&self, kind: EventKind, message: impl Into<String>, context: JsonValue) {
        self.log(Level::Warning, kind, message, context);
    }

    /// Records an `error` event.
    pub fn error(&self, kind: EventKind, message: impl Into<String>, context: JsonValue) {
        self.log(Level::Error, kind, message, context);
    }
}
