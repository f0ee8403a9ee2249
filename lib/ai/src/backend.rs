//! LLM backend abstraction.
//!
//! Provides a unified interface over chat-completions style inference
//! services. Backends are constructed by the caller and passed into the
//! conversation engine; nothing here holds process-wide state.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default endpoint of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Available LLM providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// OpenAI API.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Generic OpenAI-compatible API.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

impl LlmProvider {
    /// Returns the configuration name of this provider.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai_compatible",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for an LLM backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// The provider type.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key (if required).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds; zero disables the timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for LlmBackendConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmBackendConfig {
    /// Creates an OpenAI backend configuration.
    #[must_use]
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Creates a configuration for an OpenAI-compatible endpoint.
    #[must_use]
    pub fn openai_compatible(base_url: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAiCompatible,
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System context.
    System,
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
    /// Tool result message.
    Tool,
}

/// A tool call requested by the model.
///
/// `arguments` is the JSON-encoded argument object exactly as the service
/// sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// Call kind; always `function` today.
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// The function to invoke.
    pub function: FunctionCall,
}

/// Function name and encoded arguments of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Registered tool name.
    pub name: String,
    /// JSON-encoded arguments object.
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    /// Creates a function tool call.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// Text content; absent on assistant turns that only request tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool name, on tool turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The call this turn answers, on tool turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    /// Creates an assistant message that requests tool calls.
    #[must_use]
    pub fn tool_request(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            name: None,
            tool_call_id: None,
            tool_calls,
        }
    }

    /// Creates a tool result message answering `call`.
    #[must_use]
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            name: Some(call.function.name.clone()),
            tool_call_id: Some(call.id.clone()),
            tool_calls: Vec::new(),
        }
    }
}

/// Declarative description of a tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: JsonValue,
}

impl ToolDefinition {
    /// Creates a new tool definition with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the parameter schema.
    #[must_use]
    pub fn with_parameters(mut self, schema: JsonValue) -> Self {
        self.parameters = schema;
        self
    }

    /// Converts the definition to the chat-completions `tools` entry.
    #[must_use]
    pub fn to_llm_format(&self) -> JsonValue {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A request to an LLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmRequest {
    /// Model identifier.
    pub model: String,
    /// Temperature for sampling.
    pub temperature: f64,
    /// The full transcript so far.
    pub messages: Vec<ChatMessage>,
    /// Tool offered with automatic tool selection, if any.
    pub tool: Option<ToolDefinition>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Creates a request for the given model and transcript.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            messages,
            tool: None,
            max_tokens: None,
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Offers a tool to the model.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A response from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmResponse {
    /// The generated text, if any.
    pub content: Option<String>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Model that generated the response.
    pub model: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// The response body as received.
    pub raw: JsonValue,
}

impl LlmResponse {
    /// Creates a text response.
    #[must_use]
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            raw: serde_json::json!({ "content": content }),
            content: Some(content),
            tool_calls: Vec::new(),
            model: model.into(),
            usage: TokenUsage::default(),
        }
    }

    /// Creates a response that only requests tool calls.
    #[must_use]
    pub fn tool_calls(model: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            raw: serde_json::json!({ "tool_calls": tool_calls }),
            content: None,
            tool_calls,
            model: model.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for LLM backends.
///
/// This trait defines the interface that all LLM providers must implement.
/// Implementations impose their own deadlines, if any.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Completes the transcript in `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or its reply
    /// cannot be understood.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Returns the provider type.
    fn provider(&self) -> LlmProvider;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_request_builder() {
        let request = LlmRequest::new("gpt-4", vec![ChatMessage::system("Be brief.")])
            .with_temperature(0.7)
            .with_tool(ToolDefinition::new("save_file", "Saves a file"))
            .with_max_tokens(100);

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.tool.as_ref().map(|t| t.name.as_str()), Some("save_file"));
        assert_eq!(request.max_tokens, Some(100));
    }

    #[test]
    fn chat_message_wire_shape() {
        let json = serde_json::to_value(ChatMessage::user("Hi")).expect("serialize");
        assert_eq!(json, serde_json::json!({ "role": "user", "content": "Hi" }));
    }

    #[test]
    fn tool_result_answers_call() {
        let call = ToolCall::new("call_1", "save_file", "{}");
        let json = serde_json::to_value(ChatMessage::tool_result(&call, "ok")).expect("serialize");

        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["name"], "save_file");
        assert_eq!(json["content"], "ok");
    }

    #[test]
    fn tool_request_omits_content() {
        let message = ChatMessage::tool_request(vec![ToolCall::new("c", "f", "{}")]);
        let json = serde_json::to_value(&message).expect("serialize");

        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "f");
    }

    #[test]
    fn tool_call_decodes_without_type() {
        let call: ToolCall = serde_json::from_value(serde_json::json!({
            "id": "call_1",
            "function": { "name": "save_file", "arguments": "{\"path\":\"a\"}" }
        }))
        .expect("deserialize");
        assert_eq!(call.call_type, "function");
        assert_eq!(call.function.arguments, "{\"path\":\"a\"}");
    }

    #[test]
    fn tool_definition_llm_format() {
        let tool = ToolDefinition::new("calculate", "Do math").with_parameters(serde_json::json!({
            "type": "object",
            "properties": { "expression": { "type": "string" } }
        }));

        let format = tool.to_llm_format();
        assert_eq!(format["type"], "function");
        assert_eq!(format["function"]["name"], "calculate");
        assert_eq!(
            format["function"]["parameters"]["properties"]["expression"]["type"],
            "string"
        );
    }

    #[test]
    fn token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn backend_config_defaults() {
        let config: LlmBackendConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, LlmBackendConfig::default());
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.timeout_secs, 600);
    }

    #[test]
    fn provider_names() {
        let provider: LlmProvider =
            serde_json::from_str("\"openai_compatible\"").expect("deserialize");
        assert_eq!(provider, LlmProvider::OpenAiCompatible);
        assert_eq!(LlmProvider::OpenAi.to_string(), "openai");
    }
}
