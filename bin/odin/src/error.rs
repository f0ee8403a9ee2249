//! Command-level errors.
//!
//! Commands return `Report<CliError>`; lower-level errors are converted at
//! the call site with `map_err`.

use odin_conversation::RunErrorKind;
use std::fmt;

/// Errors surfaced by `odin` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { reason: String },
    /// The document or prompt source could not be read.
    Fetch { source: String, reason: String },
    /// The inference backend could not be created or called.
    Backend { reason: String },
    /// Template variables are malformed.
    InvalidArgument { reason: String },
    /// No prompt was given and stdin was empty.
    EmptyPrompt,
    /// A conversation run failed.
    Run { kind: RunErrorKind, reason: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Fetch { source, reason } => {
                write!(f, "failed to read '{source}': {reason}")
            }
            Self::Backend { reason } => write!(f, "inference backend error: {reason}"),
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::EmptyPrompt => write!(f, "no prompt given"),
            Self::Run { kind, reason } => write!(f, "run failed ({kind}): {reason}"),
        }
    }
}

impl std::error::Error for CliError {}
