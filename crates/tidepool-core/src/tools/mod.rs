//! Tool layer
//!
//! The tool set exposed to the driving loop:
//! - ls / read_file / write_file / edit_file / glob / grep: filesystem
//!   operations over the active storage backend
//! - write_todos: wholesale plan replacement
//! - task: sub-agent dispatch

pub mod fs;
pub mod hooks;
pub mod registry;
pub mod task;
pub mod todos;

pub use fs::{EditFileTool, GlobTool, GrepTool, LsTool, ReadFileTool, WriteFileTool};
pub use hooks::{HookResult, LoggingHook, PostToolHook, PreToolHook, ReadOnlyHook};
pub use registry::{
    parse_params, tool_category, Tool, ToolCategory, ToolContext, ToolDefinition, ToolRegistry,
    ToolResult,
};
pub use task::TaskTool;
pub use todos::WriteTodosTool;
