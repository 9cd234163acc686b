//! File stats tool — cache counters for the scope.

use async_trait::async_trait;
use agentvfs_core::error::ToolError;
use agentvfs_core::tool::{Tool, ToolResult};

use crate::FileSystemTools;

pub struct FileStatsTool {
    tools: FileSystemTools,
}

impl FileStatsTool {
    pub fn new(tools: FileSystemTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for FileStatsTool {
    fn name(&self) -> &str {
        "file_stats"
    }

    fn description(&self) -> &str {
        "Show how many files exist, how many are persisted, and how many are waiting to be saved."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let server = self.tools.server(self.name()).await?;
        let stats = match server.stats().await {
            Ok(stats) => stats,
            Err(e) => return Ok(ToolResult::failed(format!("Failed to read stats: {e}"))),
        };

        let data = serde_json::to_value(stats).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        let output = format!(
            "{} files ({} in memory, {} persisted, {} unsaved, {} pending)",
            stats.total_files,
            stats.memory_files,
            stats.persisted_files,
            stats.dirty_files,
            stats.pending_persist
        );
        Ok(ToolResult::ok(output).with_data(data))
    }
}
