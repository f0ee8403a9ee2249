//! `odin ask`: send a single prompt.

use crate::cli::AskArgs;
use crate::commands::backend;
use crate::config::OdinConfig;
use crate::error::CliError;
use crate::fetch::{Source, fetch, read_stdin};
use odin_ai::{ChatMessage, LlmBackend, LlmRequest};
use odin_document::resolve;
use odin_core::Result;

/// System context sent with every prompt.
pub const DEFAULT_SYSTEM_CONTEXT: &str = "You are a helpful assistant.";

/// Asks the configured backend and prints the answer.
///
/// # Errors
///
/// Returns an error if the prompt cannot be read, a variable is malformed,
/// or the backend call fails.
pub async fn execute(args: AskArgs, config: &OdinConfig) -> Result<(), CliError> {
    let prompt = read_prompt(args.prompt.as_deref()).await?;
    let client = backend(&config.backend)?;
    let answer = ask(&client, &prompt, &args.variables, &args.model, args.temperature).await?;
    println!("{answer}");
    Ok(())
}

/// Returns the prompt text.
///
/// A prompt naming a URL or an existing file is replaced by its content;
/// without a prompt, stdin is read.
async fn read_prompt(prompt: Option<&str>) -> Result<String, CliError> {
    let text = match prompt {
        Some(prompt) if Source::parse(prompt).is_reference() => {
            fetch(prompt).await.map_err(|e| CliError::Fetch {
                source: prompt.to_string(),
                reason: e.to_string(),
            })?
        }
        Some(prompt) => prompt.to_string(),
        None => read_stdin().await.map_err(|e| CliError::Fetch {
            source: "-".to_string(),
            reason: e.to_string(),
        })?,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(CliError::EmptyPrompt.into());
    }
    Ok(text.to_string())
}

/// Resolves `prompt` with `variables` and returns the model's answer.
///
/// # Errors
///
/// Returns an error if a variable is malformed or the backend call fails.
pub async fn ask<B: LlmBackend>(
    backend: &B,
    prompt: &str,
    variables: &[String],
    model: &str,
    temperature: f64,
) -> Result<String, CliError> {
    let prompt = resolve(prompt, variables).map_err(|e| CliError::InvalidArgument {
        reason: e.to_string(),
    })?;

    let request = LlmRequest::new(
        model,
        vec![
            ChatMessage::system(DEFAULT_SYSTEM_CONTEXT),
            ChatMessage::user(prompt),
        ],
    )
    .with_temperature(temperature);

    let response = backend
        .complete(&request)
        .await
        .map_err(|e| CliError::Backend {
            reason: e.to_string(),
        })?;
    Ok(response.content.unwrap_or_default())
}
