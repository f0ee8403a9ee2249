//! Conversation engine for odin.
//!
//! This crate replays a parsed conversation document against an inference
//! backend:
//!
//! - **Orchestrator**: the sequential turn loop and its run outcome
//! - **Transcript**: the append-only chat history sent on every call
//! - **Tool Registry**: named local functions the model may call
//! - **Event Log**: structured, leveled run events fanned out to sinks
//! - **Persister**: writes turn output under the run's output directory

pub mod error;
pub mod event;
pub mod orchestrator;
pub mod persist;
pub mod tool;
pub mod transcript;

pub use error::{BoxError, PersistError, RunError, RunErrorKind, SinkError, ToolError};
pub use event::{
    Event, EventKind, EventLog, EventSink, JsonLinesSink, Level, MemorySink, TracingSink,
};
pub use orchestrator::{Orchestrator, RunFailure, RunOptions, RunReport, RunState};
pub use persist::ResponsePersister;
pub use tool::{JsonMap, SAVE_FILE, ToolRegistry, builtin_tools, save_file_definition};
pub use transcript::Transcript;
