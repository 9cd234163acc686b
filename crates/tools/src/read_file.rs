//! Read file tool — return a file's contents, loading it from storage if needed.

use async_trait::async_trait;
use agentvfs_core::error::ToolError;
use agentvfs_core::tool::{Tool, ToolResult};

use crate::{FileSystemTools, required_str};

pub struct ReadFileTool {
    tools: FileSystemTools,
}

impl ReadFileTool {
    pub fn new(tools: FileSystemTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;

        let server = self.tools.server(self.name()).await?;
        match server.read_file(path).await {
            Ok(content) => Ok(ToolResult::ok(String::from_utf8_lossy(&content).into_owned())),
            Err(e) => Ok(ToolResult::failed(format!("Failed to read file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tools, tools_with_store};
    use agentvfs_core::file::FileOptions;
    use agentvfs_persistence::InMemoryPersistence;
    use std::sync::Arc;

    #[tokio::test]
    async fn read_existing_file() {
        let tools = tools().await;
        let server = tools.server("test").await.unwrap();
        server
            .write_file("/scratch/test.txt", "Hello, World!", FileOptions::default())
            .await
            .unwrap();

        let tool = ReadFileTool::new(tools);
        let result = tool
            .execute(serde_json::json!({"path": "/scratch/test.txt"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "Hello, World!");
    }

    #[tokio::test]
    async fn read_loads_indexed_file() {
        let store = Arc::new(InMemoryPersistence::new());
        store.seed("agent-1", "/Memories/old.md", "remembered").await;

        let tool = ReadFileTool::new(tools_with_store(store).await);
        let result = tool
            .execute(serde_json::json!({"path": "/Memories/old.md"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "remembered");
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let tool = ReadFileTool::new(tools().await);
        let result = tool
            .execute(serde_json::json!({"path": "/Memories/missing.md"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Failed to read"));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let tool = ReadFileTool::new(tools().await);
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
