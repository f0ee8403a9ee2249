//! Error types for the conversation crate.
//!
//! - `ToolError`: tool dispatch failures
//! - `PersistError`: output writes that failed
//! - `SinkError`: event sink failures, reported but never fatal
//! - `RunError`: anything that ends a run, classified by `RunErrorKind`

use odin_ai::LlmError;
use odin_document::{DocumentError, TemplateError};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Error type returned by tool handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from tool dispatch.
#[derive(Debug, Clone)]
pub enum ToolError {
    /// No tool is registered under the name.
    NotFound { name: String },
    /// The call's arguments are not a JSON object.
    InvalidArguments {
        name: String,
        call_id: String,
        reason: String,
    },
    /// The handler returned an error.
    ExecutionFailed {
        name: String,
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "tool not found: {name}"),
            Self::InvalidArguments {
                name,
                call_id,
                reason,
            } => {
                write!(
                    f,
                    "invalid arguments for tool '{name}' in call {call_id}: {reason}"
                )
            }
            Self::ExecutionFailed { name, source } => {
                write!(f, "tool '{name}' execution failed: {source}")
            }
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ExecutionFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Errors from writing turn output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// A parent directory could not be created.
    CreateDirectory { path: PathBuf, reason: String },
    /// The file could not be written.
    Write { path: PathBuf, reason: String },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDirectory { path, reason } => {
                write!(f, "failed to create directory {}: {reason}", path.display())
            }
            Self::Write { path, reason } => {
                write!(f, "failed to write {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for PersistError {}

/// Errors from event sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The event could not be encoded.
    Encode { reason: String },
    /// The log target could not be opened or written.
    Io { path: PathBuf, reason: String },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { reason } => write!(f, "failed to encode event: {reason}"),
            Self::Io { path, reason } => {
                write!(f, "failed to write event log {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunErrorKind {
    /// The document header could not be parsed.
    Parse,
    /// The document has no thread record.
    MissingThread,
    /// A record's metadata has the wrong shape.
    InvalidMetadata,
    /// A template variable is malformed.
    InvalidArgument,
    /// The model called a tool that is not registered.
    ToolNotFound,
    /// A tool call's arguments could not be decoded.
    ToolArgument,
    /// A tool handler failed.
    ToolExecution,
    /// The inference service call failed.
    Inference,
    /// Turn output could not be saved.
    Persist,
}

impl RunErrorKind {
    /// Returns the snake-case name used in event context.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::MissingThread => "missing_thread",
            Self::InvalidMetadata => "invalid_metadata",
            Self::InvalidArgument => "invalid_argument",
            Self::ToolNotFound => "tool_not_found",
            Self::ToolArgument => "tool_argument",
            Self::ToolExecution => "tool_execution",
            Self::Inference => "inference",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any error that ends a run.
#[derive(Debug, Clone)]
pub enum RunError {
    /// Document parsing or selection failed.
    Document(DocumentError),
    /// Template variables are malformed.
    Template(TemplateError),
    /// Tool dispatch failed.
    Tool(ToolError),
    /// The inference call failed.
    Inference(LlmError),
    /// Output could not be saved.
    Persist(PersistError),
}

impl RunError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> RunErrorKind {
        match self {
            Self::Document(DocumentError::MissingThread) => RunErrorKind::MissingThread,
            Self::Document(DocumentError::InvalidMetadata { .. }) => RunErrorKind::InvalidMetadata,
            Self::Document(_) => RunErrorKind::Parse,
            Self::Template(_) => RunErrorKind::InvalidArgument,
            Self::Tool(ToolError::NotFound { .. }) => RunErrorKind::ToolNotFound,
            Self::Tool(ToolError::InvalidArguments { .. }) => RunErrorKind::ToolArgument,
            Self::Tool(ToolError::ExecutionFailed { .. }) => RunErrorKind::ToolExecution,
            Self::Inference(_) => RunErrorKind::Inference,
            Self::Persist(_) => RunErrorKind::Persist,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(e) => e.fmt(f),
            Self::Template(e) => e.fmt(f),
            Self::Tool(e) => e.fmt(f),
            Self::Inference(e) => e.fmt(f),
            Self::Persist(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Document(e) => Some(e),
            Self::Template(e) => Some(e),
            Self::Tool(e) => Some(e),
            Self::Inference(e) => Some(e),
            Self::Persist(e) => Some(e),
        }
    }
}

impl From<DocumentError> for RunError {
    fn from(e: DocumentError) -> Self {
        Self::Document(e)
    }
}

impl From<TemplateError> for RunError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

impl From<ToolError> for RunError {
    fn from(e: ToolError) -> Self {
        Self::Tool(e)
    }
}

impl From<LlmError> for RunError {
    fn from(e: LlmError) -> Self {
        Self::Inference(e)
    }
}

impl From<PersistError> for RunError {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}
