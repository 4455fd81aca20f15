//! Filesystem tools
//!
//! Thin, backend-agnostic wrappers over the storage contract. Each tool
//! validates its parameters, delegates to the active backend, and maps
//! failures into structured results the model can act on. None of them
//! hold state of their own.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub struct LsTool;

#[derive(Deserialize)]
struct LsParams {
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List files, optionally under a path prefix."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path prefix to list under (default: everything)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<LsParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let prefix = params.path.unwrap_or_default();

        match ctx.store.list(&prefix).await {
            Ok(paths) => ToolResult::success_data(json!({
                "paths": paths,
                "count": paths.len()
            })),
            Err(e) => e.into(),
        }
    }
}

pub struct ReadFileTool;

#[derive(Deserialize)]
struct ReadParams {
    file_path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents. Supports a 1-based line offset and limit for large files; over-long lines are truncated with a marker."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path of the file to read"
                },
                "offset": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "The line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "The number of lines to read (default: to end of file)"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<ReadParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let offset = params.offset.unwrap_or(1);
        if offset == 0 {
            return ToolResult::invalid_parameters("offset is 1-based; use offset >= 1");
        }

        match ctx.store.read(&params.file_path, offset, params.limit).await {
            Ok(window) => {
                let mut warnings = Vec::new();
                if window.truncated_lines > 0 {
                    warnings.push(format!(
                        "{} line(s) exceeded the line-length limit and were truncated",
                        window.truncated_lines
                    ));
                }
                ToolResult::success_data_with(
                    json!({
                        "content": window.content,
                        "total_lines": window.total_lines,
                        "lines_returned": window.lines_returned,
                        "start_line": window.start_line
                    }),
                    warnings,
                )
            }
            Err(e) => e.into(),
        }
    }
}

pub struct WriteFileTool;

#[derive(Deserialize)]
struct WriteParams {
    file_path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create a file or wholly overwrite an existing one."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["file_path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<WriteParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match ctx.store.write(&params.file_path, &params.content).await {
            Ok(()) => ToolResult::success_data(json!({
                "message": format!("Wrote {}", params.file_path),
                "file_path": params.file_path,
                "bytes": params.content.len()
            })),
            Err(e) => e.into(),
        }
    }
}

pub struct EditFileTool;

#[derive(Deserialize)]
struct EditParams {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Exact string replacement in a file. old_string must occur exactly once unless replace_all is true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path of the file to modify"
                },
                "old_string": {
                    "type": "string",
                    "description": "The text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The text to replace it with"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)",
                    "default": false
                }
            },
            "required": ["file_path", "old_string", "new_string"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<EditParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match ctx
            .store
            .edit(
                &params.file_path,
                &params.old_string,
                &params.new_string,
                params.replace_all,
            )
            .await
        {
            Ok(outcome) => ToolResult::success_data(json!({
                "message": format!("Replaced {} occurrence(s)", outcome.replacements),
                "replacements": outcome.replacements,
                "file_path": params.file_path
            })),
            Err(e) => e.into(),
        }
    }
}

pub struct GlobTool;

#[derive(Deserialize)]
struct GlobParams {
    pattern: String,
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files whose full path matches a shell-style glob (*, ?, **). Results are sorted."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern evaluated against the full path"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<GlobParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match ctx.store.glob(&params.pattern).await {
            Ok(paths) => ToolResult::success_data(json!({
                "paths": paths,
                "count": paths.len()
            })),
            Err(e) => e.into(),
        }
    }
}

pub struct GrepTool;

#[derive(Deserialize)]
struct GrepParams {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Returns (path, line number, line) for every match."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex (or literal text) to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Path prefix to search under (default: everything)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<GrepParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let prefix = params.path.unwrap_or_default();

        match ctx.store.grep(&params.pattern, &prefix).await {
            Ok(matches) => {
                let hits: Vec<Value> = matches
                    .iter()
                    .map(|m| {
                        json!({
                            "path": m.path,
                            "line_number": m.line_number,
                            "line": m.line
                        })
                    })
                    .collect();
                ToolResult::success_data(json!({
                    "matches": hits,
                    "count": hits.len()
                }))
            }
            Err(e) => e.into(),
        }
    }
}
