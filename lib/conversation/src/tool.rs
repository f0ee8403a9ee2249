//! Tool registry for tool-handled turns.
//!
//! Tools are registered by name at startup with a declarative schema and a
//! handler. A message's `response_handler` names the one tool offered to
//! the model for that turn; calls the model makes are dispatched here.

use crate::error::{BoxError, ToolError};
use crate::persist::ResponsePersister;
use odin_ai::{ToolCall, ToolDefinition};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Decoded tool-call arguments.
pub type JsonMap = serde_json::Map<String, JsonValue>;

type Handler = Arc<dyn Fn(&JsonMap) -> Result<String, BoxError> + Send + Sync>;

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    handler: Handler,
}

/// Registry of callable tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register<F>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(&JsonMap) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler: Arc::new(handler),
            },
        );
    }

    /// Registers a tool, builder style.
    #[must_use]
    pub fn with_tool<F>(mut self, definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(&JsonMap) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.register(definition, handler);
        self
    }

    /// Gets a tool's schema by name.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Returns whether a tool is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the tool a call names and returns its textual result.
    ///
    /// Arguments are decoded before the name is looked up, so a call with
    /// undecodable arguments fails as such even if the tool is unknown.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if the arguments are not a JSON object,
    /// `NotFound` if no tool has the name, and `ExecutionFailed` if the
    /// handler fails.
    pub fn dispatch(&self, call: &ToolCall) -> Result<String, ToolError> {
        let name = &call.function.name;
        let invalid = |reason: String| ToolError::InvalidArguments {
            name: name.clone(),
            call_id: call.id.clone(),
            reason,
        };

        let arguments = match serde_json::from_str(&call.function.arguments) {
            Ok(JsonValue::Object(map)) => map,
            Ok(other) => {
                return Err(invalid(format!(
                    "expected a JSON object, got {}",
                    json_type(&other)
                )));
            }
            Err(e) => return Err(invalid(e.to_string())),
        };

        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound { name: name.clone() })?;

        debug!(tool = %name, call_id = %call.id, "dispatching tool call");
        (tool.handler)(&arguments).map_err(|source| ToolError::ExecutionFailed {
            name: name.clone(),
            source: Arc::from(source),
        })
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Name of the built-in file-saving tool.
pub const SAVE_FILE: &str = "save_file";

/// Schema of the built-in `save_file` tool.
#[must_use]
pub fn save_file_definition() -> ToolDefinition {
    ToolDefinition::new(SAVE_FILE, "Saves content to a file at the given path").with_parameters(
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the output directory"
                },
                "content": {
                    "type": "string",
                    "description": "Full text to write to the file"
                }
            },
            "required": ["path", "content"]
        }),
    )
}

fn string_argument<'a>(arguments: &'a JsonMap, key: &str) -> Result<&'a str, BoxError> {
    arguments
        .get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| BoxError::from(format!("missing string argument `{key}`")))
}

/// Checks that `path` stays beneath the directory it is joined to.
fn contained_path(path: &str) -> Result<&Path, BoxError> {
    let path = Path::new(path);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.as_os_str().is_empty() {
        return Err(format!(
            "path `{}` must be relative to the output directory",
            path.display()
        )
        .into());
    }
    Ok(path)
}

/// Returns a registry holding the built-in tools.
///
/// `save_file` writes beneath `output_dir` and answers with the saved path
/// and content as a JSON object. Absolute paths and `..` components are
/// refused.
#[must_use]
pub fn builtin_tools(output_dir: impl Into<PathBuf>) -> ToolRegistry {
    let persister = ResponsePersister::new(output_dir);
    ToolRegistry::new().with_tool(save_file_definition(), move |arguments| {
        let path = string_argument(arguments, "path")?;
        let content = string_argument(arguments, "content")?;
        persister.save(contained_path(path)?, content)?;
        Ok(serde_json::json!({ "path": path, "content": content }).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_registry() -> ToolRegistry {
        ToolRegistry::new().with_tool(ToolDefinition::new("echo", "Echoes text"), |args| {
            Ok(args
                .get("text")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string())
        })
    }

    #[test]
    fn registry_operations() {
        let registry = echo_registry();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));
        assert!(registry.definition("echo").is_some());
        assert!(registry.definition("nonexistent").is_none());
    }

    #[test]
    fn dispatch_returns_handler_result() {
        let call = ToolCall::new("call_1", "echo", r#"{"text":"hi"}"#);
        assert_eq!(echo_registry().dispatch(&call).expect("dispatch"), "hi");
    }

    #[test]
    fn unknown_tool_is_not_found() {
        let call = ToolCall::new("call_1", "missing", "{}");
        let err = echo_registry().dispatch(&call).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { ref name } if name == "missing"));
    }

    #[test]
    fn undecodable_arguments_fail_before_lookup() {
        let call = ToolCall::new("call_9", "missing", "{not json");
        let err = echo_registry().dispatch(&call).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref call_id, .. } if call_id == "call_9"));
    }

    #[test]
    fn non_object_arguments_are_invalid() {
        let call = ToolCall::new("call_1", "echo", "[1, 2]");
        let err = echo_registry().dispatch(&call).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn handler_error_is_wrapped() {
        let registry = ToolRegistry::new()
            .with_tool(ToolDefinition::new("fail", "Always fails"), |_| {
                Err("boom".into())
            });
        let err = registry
            .dispatch(&ToolCall::new("c", "fail", "{}"))
            .unwrap_err();

        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn save_file_writes_under_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = builtin_tools(dir.path());
        let call = ToolCall::new(
            "call_1",
            SAVE_FILE,
            r#"{"path":"notes/a.md","content":"hello"}"#,
        );

        let result = registry.dispatch(&call).expect("dispatch");

        let written = std::fs::read_to_string(dir.path().join("notes/a.md")).expect("read");
        assert_eq!(written, "hello");
        let result: JsonValue = serde_json::from_str(&result).expect("json result");
        assert_eq!(result, serde_json::json!({ "path": "notes/a.md", "content": "hello" }));
    }

    #[test]
    fn save_file_requires_path_and_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let call = ToolCall::new("call_1", SAVE_FILE, r#"{"path":"a.md"}"#);

        let err = builtin_tools(dir.path()).dispatch(&call).unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn save_file_refuses_paths_outside_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = builtin_tools(dir.path().join("out"));
        let outside = dir.path().join("escaped.md");

        for path in [outside.display().to_string(), "../escaped.md".to_string()] {
            let arguments = serde_json::json!({ "path": path, "content": "x" }).to_string();
            let err = registry
                .dispatch(&ToolCall::new("call_1", SAVE_FILE, arguments))
                .unwrap_err();

            assert!(matches!(err, ToolError::ExecutionFailed { .. }));
            assert!(err.to_string().contains("relative to the output directory"));
        }
        assert!(!outside.exists());
    }

    #[test]
    fn save_file_accepts_current_dir_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let call = ToolCall::new(
            "call_1",
            SAVE_FILE,
            r#"{"path":"./notes/b.md","content":"ok"}"#,
        );

        builtin_tools(dir.path()).dispatch(&call).expect("dispatch");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/b.md")).expect("read"),
            "ok"
        );
    }

    #[test]
    fn save_file_schema_requires_both_fields() {
        let definition = save_file_definition();
        assert_eq!(
            definition.parameters["required"],
            serde_json::json!(["path", "content"])
        );
    }
}
