//! Chat-completions client.
//!
//! Serves both [`LlmProvider`] kinds: they share the wire protocol and
//! differ only in endpoint and whether a key is mandatory.

use crate::backend::{
    LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage, ToolCall,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for `POST {base_url}/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the OpenAI provider has no API key or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &LlmBackendConfig) -> Result<Self, LlmError> {
        if config.provider == LlmProvider::OpenAi && config.api_key.is_none() {
            return Err(LlmError::InvalidConfig {
                reason: "the openai provider requires an API key".to_string(),
            });
        }

        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let http = builder.build().map_err(|e| LlmError::InvalidConfig {
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            provider: config.provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

/// Builds the chat-completions request body.
#[must_use]
pub fn request_payload(request: &LlmRequest) -> JsonValue {
    let mut payload = json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
    });
    if let Some(tool) = &request.tool {
        payload["tools"] = json!([tool.to_llm_format()]);
        payload["tool_choice"] = json!("auto");
    }
    if let Some(max_tokens) = request.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }
    payload
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Decodes a chat-completions response body, keeping it as `raw`.
///
/// # Errors
///
/// Returns `ResponseParseFailed` if the body has no first choice.
pub fn parse_completion(raw: JsonValue, requested_model: &str) -> Result<LlmResponse, LlmError> {
    let body: CompletionBody =
        serde_json::from_value(raw.clone()).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseParseFailed {
            reason: "response has no choices".to_string(),
        })?;

    let usage = body
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
        model: body.model.unwrap_or_else(|| requested_model.to_string()),
        usage,
        raw,
    })
}

fn transport_error(e: &reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::RequestFailed {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    #[instrument(skip(self, request), fields(provider = %self.provider, model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut builder = self
            .http
            .post(self.completions_url())
            .json(&request_payload(request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.map_err(|e| transport_error(&e))?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: JsonValue =
            serde_json::from_str(&body).map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;
        let parsed = parse_completion(raw, &request.model)?;

        debug!(
            tool_calls = parsed.tool_calls.len(),
            total_tokens = parsed.usage.total(),
            "completion received"
        );
        Ok(parsed)
    }

    fn provider(&self) -> LlmProvider {
        self.provider
    }
}
