//! File-oriented built-ins: `file_read`, `file_write`, `list_dir`, `glob`.

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext};
use crate::tools::{arg_error, Tool};

const MAX_READ_BYTES: usize = 200_000;

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Reads a UTF-8 text file from disk."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return arg_error("file_read", "missing required string arg `path`");
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let mut text = String::from_utf8_lossy(&bytes).into_owned();
                if text.len() > MAX_READ_BYTES {
                    text.truncate(MAX_READ_BYTES);
                    text.push_str("...[truncated]");
                }
                ToolCallContent::new(text)
            }
            Err(e) => ToolCallContent::new(format!("[ERROR] file_read: {e}")),
        }
    }
}

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Writes (overwrites) a UTF-8 text file on disk, creating parent directories as needed."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return arg_error("file_write", "missing required string arg `path`");
        };
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
            return arg_error("file_write", "missing required string arg `content`");
        };

        let path = std::path::Path::new(path);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolCallContent::new(format!("[ERROR] file_write: {e}"));
            }
        }
        match tokio::fs::write(path, content).await {
            Ok(()) => ToolCallContent::new(format!("wrote {} bytes to {}", content.len(), path.display())),
            Err(e) => ToolCallContent::new(format!("[ERROR] file_write: {e}")),
        }
    }
}

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "Lists immediate entries of a directory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return arg_error("list_dir", "missing required string arg `path`");
        };
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(rd) => rd,
            Err(e) => return ToolCallContent::new(format!("[ERROR] list_dir: {e}")),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(e) => return ToolCallContent::new(format!("[ERROR] list_dir: {e}")),
            }
        }
        names.sort();
        ToolCallContent::new(names.join("\n"))
    }
}

pub struct GlobTool {
    root: std::path::PathBuf,
}

impl GlobTool {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Finds files under the workspace root whose relative path matches a regex pattern."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"pattern": {"type": "string"}},
            "required": ["pattern"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, _ctx: &ToolCallContext) -> ToolCallContent {
        let Some(pattern) = args.get("pattern").and_then(|v| v.as_str()) else {
            return arg_error("glob", "missing required string arg `pattern`");
        };
        let re = match regex::Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => return arg_error("glob", format!("invalid pattern: {e}")),
        };

        let root = self.root.clone();
        let matches = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| {
                    e.path()
                        .strip_prefix(&root)
                        .ok()
                        .map(|p| p.to_string_lossy().into_owned())
                })
                .filter(|rel| re.is_match(rel))
                .collect::<Vec<_>>()
        })
        .await;

        match matches {
            Ok(mut paths) => {
                paths.sort();
                ToolCallContent::new(paths.join("\n"))
            }
            Err(e) => ToolCallContent::new(format!("[ERROR] glob: {e}")),
        }
    }
}
