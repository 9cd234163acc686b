//! `agentvfs write|read|rm|ls|stats` — one-shot filesystem commands.
//!
//! Each command starts the scope from the configured mounts, runs a single
//! tool call, and stops the scope gracefully so pending writes are flushed
//! before the process exits.

use agentvfs_config::AppConfig;
use agentvfs_core::tool::{ToolCall, ToolRegistry, ToolResult};
use agentvfs_persistence::mounts_from_config;
use agentvfs_runtime::{FileSystemSupervisor, RestartPolicy};
use agentvfs_tools::{FileSystemTools, filesystem_registry};
use tokio::io::AsyncReadExt;

type CmdResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A started scope with the filesystem tools bound to it.
pub struct Session {
    supervisor: FileSystemSupervisor,
    scope_key: String,
    registry: ToolRegistry,
}

impl Session {
    pub async fn open(config: &AppConfig, scope_key: &str) -> CmdResult<Self> {
        let supervisor = FileSystemSupervisor::new(RestartPolicy {
            max_restarts: config.supervisor.max_restarts,
            window: config.supervisor.restart_window(),
        });
        supervisor
            .start_filesystem(scope_key, mounts_from_config(config)?)
            .await?;

        let registry = filesystem_registry(&FileSystemTools::new(supervisor.clone(), scope_key));
        tracing::debug!(scope = %scope_key, tools = ?registry.names(), "Session opened");

        Ok(Self {
            supervisor,
            scope_key: scope_key.to_string(),
            registry,
        })
    }

    pub async fn call(&self, tool: &str, arguments: serde_json::Value) -> CmdResult<ToolResult> {
        let call = ToolCall {
            id: format!("cli-{tool}"),
            name: tool.to_string(),
            arguments,
        };
        Ok(self.registry.execute(&call).await?)
    }

    /// Stop the scope, flushing every pending write.
    pub async fn close(self) -> CmdResult<usize> {
        Ok(self.supervisor.stop_filesystem(&self.scope_key).await?)
    }
}

/// Open a session from the user's config, run one tool, close, print.
async fn run_tool(scope: &str, tool: &str, arguments: serde_json::Value) -> CmdResult<()> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let session = Session::open(&config, scope).await?;

    let result = session.call(tool, arguments).await;
    let flushed = session.close().await?;
    tracing::debug!(flushed, "Scope closed");

    let result = result?;
    if !result.success {
        return Err(result.output.into());
    }
    println!("{}", result.output);
    Ok(())
}

pub async fn write(
    scope: &str,
    path: &str,
    content: Option<String>,
    mime_type: Option<String>,
) -> CmdResult<()> {
    let content = match content {
        Some(content) => content,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let mut arguments = serde_json::json!({ "path": path, "content": content });
    if let Some(mime_type) = mime_type {
        arguments["mime_type"] = serde_json::Value::String(mime_type);
    }
    run_tool(scope, "write_file", arguments).await
}

pub async fn read(scope: &str, path: &str) -> CmdResult<()> {
    run_tool(scope, "read_file", serde_json::json!({ "path": path })).await
}

pub async fn remove(scope: &str, path: &str) -> CmdResult<()> {
    run_tool(scope, "delete_file", serde_json::json!({ "path": path })).await
}

pub async fn list(scope: &str, pattern: Option<String>) -> CmdResult<()> {
    let arguments = match pattern {
        Some(pattern) => serde_json::json!({ "pattern": pattern }),
        None => serde_json::json!({}),
    };
    run_tool(scope, "list_files", arguments).await
}

pub async fn stats(scope: &str) -> CmdResult<()> {
    run_tool(scope, "file_stats", serde_json::json!({})).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: Some(dir.to_path_buf()),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn write_survives_session_close() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let session = Session::open(&config, "cli-test").await.unwrap();
        let result = session
            .call(
                "write_file",
                serde_json::json!({"path": "/Memories/todo.md", "content": "- ship it"}),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(session.close().await.unwrap(), 1);

        let session = Session::open(&config, "cli-test").await.unwrap();
        let result = session
            .call("read_file", serde_json::json!({"path": "/Memories/todo.md"}))
            .await
            .unwrap();
        assert_eq!(result.output, "- ship it");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&config_in(dir.path()), "cli-test").await.unwrap();
        assert!(session.call("format_disk", serde_json::json!({})).await.is_err());
        session.close().await.unwrap();
    }
}
