//! Filesystem tools for agentvfs.
//!
//! Tools give a model access to its own scope of the virtual filesystem:
//! write, read, delete and list files, and inspect cache statistics. Every
//! tool resolves the scope's server through the supervisor at call time, so
//! a server restarted after a crash is picked up transparently.

pub mod delete_file;
pub mod file_stats;
pub mod list_files;
pub mod read_file;
pub mod write_file;

use agentvfs_core::error::ToolError;
use agentvfs_core::tool::ToolRegistry;
use agentvfs_runtime::{FileSystemServer, FileSystemSupervisor};
use tracing::warn;

pub use delete_file::DeleteFileTool;
pub use file_stats::FileStatsTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

/// The scope a set of tools operates on.
#[derive(Clone)]
pub struct FileSystemTools {
    supervisor: FileSystemSupervisor,
    scope_key: String,
}

impl FileSystemTools {
    pub fn new(supervisor: FileSystemSupervisor, scope_key: impl Into<String>) -> Self {
        Self {
            supervisor,
            scope_key: scope_key.into(),
        }
    }

    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    /// The live server for this scope.
    pub(crate) async fn server(&self, tool_name: &str) -> Result<FileSystemServer, ToolError> {
        let Some(server) = self.supervisor.get_filesystem(&self.scope_key).await else {
            warn!(scope = %self.scope_key, tool = tool_name, "No filesystem running for tool call");
            return Err(ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: format!("no filesystem running for scope '{}'", self.scope_key),
            });
        };
        Ok(server)
    }
}

/// Register all five filesystem tools against one scope.
pub fn register_filesystem_tools(registry: &mut ToolRegistry, tools: &FileSystemTools) {
    registry.register(Box::new(WriteFileTool::new(tools.clone())));
    registry.register(Box::new(ReadFileTool::new(tools.clone())));
    registry.register(Box::new(DeleteFileTool::new(tools.clone())));
    registry.register(Box::new(ListFilesTool::new(tools.clone())));
    registry.register(Box::new(FileStatsTool::new(tools.clone())));
}

/// Create a registry holding only the filesystem tools for one scope.
pub fn filesystem_registry(tools: &FileSystemTools) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_filesystem_tools(&mut registry, tools);
    registry
}

pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}


#[cfg(test)]
mod tests {
    use super::*;
    use agentvfs_core::tool::ToolCall;

    #[tokio::test]
    async fn registry_holds_all_filesystem_tools() {
        let registry = filesystem_registry(&testing::tools().await);
        assert_eq!(
            registry.names(),
            vec!["delete_file", "file_stats", "list_files", "read_file", "write_file"]
        );
    }

    #[tokio::test]
    async fn calls_round_trip_through_registry() {
        let registry = filesystem_registry(&testing::tools().await);

        let write = ToolCall {
            id: "call_1".into(),
            name: "write_file".into(),
            arguments: serde_json::json!({"path": "/Memories/plan.md", "content": "# Plan"}),
        };
        let result = registry.execute(&write).await.unwrap();
        assert!(result.success);
        assert_eq!(result.call_id, "call_1");

        let read = ToolCall {
            id: "call_2".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "/Memories/plan.md"}),
        };
        assert_eq!(registry.execute(&read).await.unwrap().output, "# Plan");
    }

    #[tokio::test]
    async fn unknown_scope_fails_execution() {
        let tools = FileSystemTools::new(FileSystemSupervisor::default(), "nobody");
        let err = tools.server("read_file").await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
