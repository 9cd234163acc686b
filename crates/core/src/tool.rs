//! Tool trait — how filesystem operations are offered to a model.
//!
//! A model sees each tool as a name, a description and a JSON schema for
//! its arguments. Calls come back as [`ToolCall`]s and are dispatched by
//! name through a [`ToolRegistry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;

/// What a model is told about one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// One invocation requested by a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Echoed back in the result so callers can pair them up
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Outcome of a call.
///
/// Domain failures (missing file, read-only mount) are reported here with
/// `success: false`. [`ToolError`] is reserved for calls that could not be
/// carried out at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub success: bool,
    /// Text handed back to the model
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(output)
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier, e.g. `write_file`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Tools keyed by name. Registering a name twice keeps the later tool.
#[derive(Default)]
pub struct ToolRegistry {
    by_name: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.by_name.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.by_name.get(name).map(|tool| tool.as_ref())
    }

    /// Definitions of every registered tool, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(|tool| tool.to_definition())
            .collect()
    }

    /// Run a call and stamp the result with the call's id.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id.clone_from(&call.id);
        Ok(result)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports the byte length of a `path` argument.
    struct PathLength;

    #[async_trait]
    impl Tool for PathLength {
        fn name(&self) -> &str {
            "path_length"
        }

        fn description(&self) -> &str {
            "Byte length of a path"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            })
        }

        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let path = arguments["path"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
            Ok(ToolResult::ok(path.len().to_string()))
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: format!("call-{name}"),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn lookup_and_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PathLength));

        assert!(registry.get("path_length").is_some());
        assert!(registry.get("write_file").is_none());
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].parameters["required"][0], "path");
    }

    #[test]
    fn result_data_is_skipped_when_absent() {
        let json = serde_json::to_value(ToolResult::failed("nope")).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn execute_stamps_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PathLength));

        let result = registry
            .execute(&call("path_length", serde_json::json!({"path": "/Memories/a.md"})))
            .await
            .unwrap();
        assert_eq!(result.output, "14");
        assert_eq!(result.call_id, "call-path_length");
    }

    #[tokio::test]
    async fn execute_reports_unknown_tool_and_bad_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PathLength));

        let unknown = registry
            .execute(&call("format_disk", serde_json::json!({})))
            .await;
        assert!(matches!(unknown, Err(ToolError::NotFound(_))));

        let bad = registry
            .execute(&call("path_length", serde_json::json!({})))
            .await;
        assert!(matches!(bad, Err(ToolError::InvalidArguments(_))));
    }
}
