//! Write file tool — create or overwrite a file in the agent's scope.

use async_trait::async_trait;
use agentvfs_core::error::ToolError;
use agentvfs_core::file::FileOptions;
use agentvfs_core::tool::{Tool, ToolResult};

use crate::{FileSystemTools, required_str};

pub struct WriteFileTool {
    tools: FileSystemTools,
}

impl WriteFileTool {
    pub fn new(tools: FileSystemTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does. \
         Files under a mounted directory are saved durably after a short delay."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute file path, e.g. /Memories/notes.md"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                },
                "mime_type": {
                    "type": "string",
                    "description": "MIME type of the content (default text/markdown)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let content = required_str(&arguments, "content")?;

        let mut opts = FileOptions::default();
        if let Some(mime_type) = arguments["mime_type"].as_str() {
            opts = opts.with_mime_type(mime_type);
        }

        let server = self.tools.server(self.name()).await?;
        match server.write_file(path, content, opts).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Successfully wrote {} bytes to {path}",
                content.len()
            ))
            .with_data(serde_json::json!({ "path": path, "bytes": content.len() }))),
            Err(e) => Ok(ToolResult::failed(format!("Failed to write file: {e}"))),
        }
    }
}
