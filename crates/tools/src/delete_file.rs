//! Delete file tool.

use async_trait::async_trait;
use agentvfs_core::error::ToolError;
use agentvfs_core::tool::{Tool, ToolResult};

use crate::{FileSystemTools, required_str};

pub struct DeleteFileTool {
    tools: FileSystemTools,
}

impl DeleteFileTool {
    pub fn new(tools: FileSystemTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. Files under a mounted directory are also removed from storage."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path to delete"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;

        let server = self.tools.server(self.name()).await?;
        match server.delete_file(path).await {
            Ok(()) => Ok(ToolResult::ok(format!("Deleted {path}"))),
            Err(e) => Ok(ToolResult::failed(format!("Failed to delete file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tools_with_store;
    use agentvfs_core::file::FileOptions;
    use agentvfs_persistence::InMemoryPersistence;
    use std::sync::Arc;

    #[tokio::test]
    async fn delete_removes_from_cache_and_storage() {
        let store = Arc::new(InMemoryPersistence::new());
        let tools = tools_with_store(store.clone()).await;
        let server = tools.server("test").await.unwrap();
        server
            .write_file("/Memories/gone.md", "bye", FileOptions::default())
            .await
            .unwrap();
        server.flush("/Memories/gone.md").await.unwrap();
        assert!(store.stored("agent-1", "/Memories/gone.md").await.is_some());

        let tool = DeleteFileTool::new(tools);
        let result = tool
            .execute(serde_json::json!({"path": "/Memories/gone.md"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(!server.file_exists("/Memories/gone.md").await.unwrap());
        assert!(store.stored("agent-1", "/Memories/gone.md").await.is_none());
    }

    #[tokio::test]
    async fn delete_missing_file_fails() {
        let tool = DeleteFileTool::new(tools_with_store(Arc::new(InMemoryPersistence::new())).await);
        let result = tool
            .execute(serde_json::json!({"path": "/Memories/none.md"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not found"));
    }
}
