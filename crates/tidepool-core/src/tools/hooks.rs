//! Hook pipeline for tool execution
//!
//! Hooks are the composable middleware surface: an ordered sequence of
//! interceptors with before/after contracts. A pre-hook may block a call;
//! post-hooks observe results. Composition order is registration order.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::tools::registry::{tool_category, ToolCategory, ToolContext, ToolResult};

/// Result of a hook execution
#[derive(Debug)]
pub enum HookResult {
    /// Continue with execution (no changes)
    Continue,
    /// Block execution with a reason
    Block { reason: String },
}

/// Hook called before tool execution
#[async_trait]
pub trait PreToolHook: Send + Sync {
    async fn before_execute(&self, name: &str, params: &Value, ctx: &ToolContext) -> HookResult;
}

/// Hook called after tool execution
#[async_trait]
pub trait PostToolHook: Send + Sync {
    async fn after_execute(
        &self,
        name: &str,
        params: &Value,
        result: &ToolResult,
        duration: Duration,
    ) -> HookResult;
}

/// Blocks every write-category tool, leaving reads and plan updates free.
/// Useful for sub-agents that should explore without mutating.
pub struct ReadOnlyHook;

impl ReadOnlyHook {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadOnlyHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreToolHook for ReadOnlyHook {
    async fn before_execute(&self, name: &str, _params: &Value, _ctx: &ToolContext) -> HookResult {
        // The plan tool mutates only its own state, never files.
        if name == "write_todos" {
            return HookResult::Continue;
        }
        if tool_category(name) == ToolCategory::Write {
            return HookResult::Block {
                reason: format!("Tool '{}' is blocked in read-only mode", name),
            };
        }
        HookResult::Continue
    }
}

/// Logs every tool execution with timing
pub struct LoggingHook;

impl LoggingHook {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostToolHook for LoggingHook {
    async fn after_execute(
        &self,
        name: &str,
        _params: &Value,
        result: &ToolResult,
        duration: Duration,
    ) -> HookResult {
        tracing::info!(
            tool = name,
            duration_ms = duration.as_millis() as u64,
            is_error = result.is_error,
            output_len = result.output.len(),
            "Tool execution completed"
        );
        HookResult::Continue
    }
}
