//! List files tool — every path in the scope, optionally filtered by a
//! `*` wildcard pattern.

use async_trait::async_trait;
use agentvfs_core::error::ToolError;
use agentvfs_core::tool::{Tool, ToolResult};
use regex_lite::Regex;

use crate::FileSystemTools;

pub struct ListFilesTool {
    tools: FileSystemTools,
}

impl ListFilesTool {
    pub fn new(tools: FileSystemTools) -> Self {
        Self { tools }
    }
}

/// Compile a wildcard pattern. `*` matches any run of characters
/// (including `/`); everything else is literal and the whole path must match.
pub fn wildcard_regex(pattern: &str) -> Result<Regex, regex_lite::Error> {
    let escaped = regex_lite::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List file paths. An optional pattern filters them, where '*' matches anything \
         (e.g. /Memories/*.md)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Wildcard pattern matched against the full path"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let matcher = match arguments["pattern"].as_str() {
            Some(pattern) => Some(wildcard_regex(pattern).map_err(|e| {
                ToolError::InvalidArguments(format!("Invalid pattern '{pattern}': {e}"))
            })?),
            None => None,
        };

        let server = self.tools.server(self.name()).await?;
        let files = match server.list_files().await {
            Ok(files) => files,
            Err(e) => return Ok(ToolResult::failed(format!("Failed to list files: {e}"))),
        };

        let files: Vec<String> = match &matcher {
            Some(regex) => files.into_iter().filter(|path| regex.is_match(path)).collect(),
            None => files,
        };

        let output = if files.is_empty() {
            "No files found.".to_string()
        } else {
            files.join("\n")
        };
        Ok(ToolResult::ok(output).with_data(serde_json::json!({ "files": files })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tools;
    use agentvfs_core::file::FileOptions;

    #[test]
    fn wildcard_matches_whole_path() {
        let regex = wildcard_regex("/Memories/*.md").unwrap();
        assert!(regex.is_match("/Memories/a.md"));
        assert!(regex.is_match("/Memories/deep/b.md"));
        assert!(!regex.is_match("/Memories/a.md.bak"));
        assert!(!regex.is_match("/scratch/Memories/a.md"));
    }

    #[test]
    fn wildcard_escapes_regex_syntax() {
        let regex = wildcard_regex("/notes/(draft)+.txt").unwrap();
        assert!(regex.is_match("/notes/(draft)+.txt"));
        assert!(!regex.is_match("/notes/draftdraft.txt"));
        assert!(!wildcard_regex("/a.txt").unwrap().is_match("/abtxt"));
    }

    async fn populated() -> ListFilesTool {
        let tools = tools().await;
        let server = tools.server("test").await.unwrap();
        for path in ["/Memories/b.md", "/Memories/a.md", "/scratch/c.txt"] {
            server.write_file(path, "x", FileOptions::default()).await.unwrap();
        }
        ListFilesTool::new(tools)
    }

    #[tokio::test]
    async fn lists_everything_sorted() {
        let tool = populated().await;
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "/Memories/a.md\n/Memories/b.md\n/scratch/c.txt");
    }

    #[tokio::test]
    async fn filters_by_pattern() {
        let tool = populated().await;
        let result = tool
            .execute(serde_json::json!({"pattern": "/Memories/*"}))
            .await
            .unwrap();
        assert_eq!(
            result.data.unwrap()["files"],
            serde_json::json!(["/Memories/a.md", "/Memories/b.md"])
        );
    }

    #[tokio::test]
    async fn no_matches() {
        let tool = populated().await;
        let result = tool
            .execute(serde_json::json!({"pattern": "*.pdf"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "No files found.");
    }
}
