//! Error types for the document crate.
//!
//! - `DocumentError`: parsing and record selection failures
//! - `TemplateError`: malformed template variable arguments

use std::fmt;

/// Errors from parsing a document or selecting its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// A front-matter header could not be parsed.
    MalformedHeader { line: usize, reason: String },
    /// The document contains no thread record.
    MissingThread,
    /// A record's metadata has the wrong shape for its type.
    InvalidMetadata { id: String, reason: String },
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader { line, reason } => {
                write!(f, "malformed header starting at line {line}: {reason}")
            }
            Self::MissingThread => write!(f, "document has no thread record"),
            Self::InvalidMetadata { id, reason } => {
                write!(f, "invalid metadata for record '{id}': {reason}")
            }
        }
    }
}

impl std::error::Error for DocumentError {}

/// Errors from template variable handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A variable argument is not of the form `key=value`.
    InvalidArgument { token: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { token } => {
                write!(f, "invalid template variable '{token}': expected key=value")
            }
        }
    }
}

impl std::error::Error for TemplateError {}
