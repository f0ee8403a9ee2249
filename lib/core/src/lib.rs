//! Core types and utilities for odin.
//!
//! This crate provides the foundational types and error handling shared by
//! the document, AI, and conversation crates as well as the `odin` binary.

pub mod envelope;
pub mod error;
pub mod id;

pub use envelope::{CURRENT_VERSION, Envelope};
pub use error::Result;
pub use id::{ParseIdError, RunId};
