//! Subcommand implementations.

pub mod ask;
pub mod run;

use crate::error::CliError;
use odin_ai::{LlmBackendConfig, OpenAiClient};
use odin_core::Result;

/// Builds the configured inference client.
pub(crate) fn backend(config: &LlmBackendConfig) -> Result<OpenAiClient, CliError> {
    OpenAiClient::from_config(config).map_err(|e| {
        CliError::Backend {
            reason: e.to_string(),
        }
        .into()
    })
}
