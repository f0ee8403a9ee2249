//! Inference service boundary for odin.
//!
//! This crate provides:
//!
//! - **Chat model**: role-tagged messages, tool calls, and tool definitions
//!   in the shape chat-completions services exchange
//! - **Backend trait**: [`LlmBackend`], the single `complete` capability the
//!   conversation engine calls
//! - **OpenAI client**: [`OpenAiClient`], serving every [`LlmProvider`] that
//!   speaks the chat-completions protocol

pub mod backend;
pub mod error;
pub mod openai;

pub use backend::{
    ChatMessage, FunctionCall, LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest,
    LlmResponse, MessageRole, TokenUsage, ToolCall, ToolDefinition,
};
pub use error::LlmError;
pub use openai::OpenAiClient;
