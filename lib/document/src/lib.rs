//! Conversation documents for odin.
//!
//! A conversation document is a single text file made of blocks. Each block
//! opens with a `---` delimited front-matter header followed by free-form
//! content:
//!
//! ```text
//! ---
//! id: onboarding
//! type: thread
//! log_file: logs/onboarding.log
//! ---
//! You are a technical writer for {product}.
//! ---
//! id: intro
//! type: message
//! thread_id: onboarding
//! order: 1
//! ---
//! Write an introduction.
//! ```
//!
//! This crate provides:
//!
//! - **Parser**: splits the text into [`Record`]s keyed by id ([`Document`])
//! - **Script views**: typed [`Thread`] / [`Message`] selection and ordering
//! - **Templates**: literal `{key}` substitution from `key=value` arguments

pub mod error;
pub mod parser;
pub mod record;
pub mod script;
pub mod template;

pub use error::{DocumentError, TemplateError};
pub use record::{Document, Metadata, Record};
pub use script::{DEFAULT_MODEL, Message, OrderKey, Thread};
pub use template::{TemplateVariables, resolve};
