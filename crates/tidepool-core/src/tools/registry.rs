//! Tool registry
//!
//! Tools publish a name, a description, and a JSON parameter schema, and
//! execute against a shared context. The registry validates nothing about
//! semantics - each tool parses its own parameters before touching the
//! context - but it owns timeouts and the pre/post hook pipeline.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::backend::{FsError, StorageBackend};
use crate::plan::TodoList;
use crate::tools::hooks::{HookResult, PostToolHook, PreToolHook};

/// Default tool execution timeout (2 minutes)
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Tool category for policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    /// Never modifies backend or plan state.
    ReadOnly,
    /// Mutates files or the plan.
    Write,
    /// Spawns a nested execution.
    Dispatch,
}

/// Categorize a tool by name.
pub fn tool_category(name: &str) -> ToolCategory {
    match name {
        "ls" | "read_file" | "glob" | "grep" => ToolCategory::ReadOnly,
        "task" => ToolCategory::Dispatch,
        _ => ToolCategory::Write,
    }
}

/// Tool execution result
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a success result with plain text output
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create a structured success envelope with `ok=true` and `data`.
    pub fn success_data(data: Value) -> Self {
        Self::success_data_with(data, Vec::new())
    }

    /// Create a structured success envelope with warnings.
    pub fn success_data_with(data: Value, warnings: Vec<String>) -> Self {
        let mut envelope = serde_json::Map::new();
        envelope.insert("ok".to_string(), Value::Bool(true));
        envelope.insert("data".to_string(), data);
        if !warnings.is_empty() {
            envelope.insert(
                "warnings".to_string(),
                Value::Array(warnings.into_iter().map(Value::String).collect()),
            );
        }
        Self {
            output: Value::Object(envelope).to_string(),
            is_error: false,
        }
    }

    /// Create a structured error with explicit code.
    pub fn error_with_code(code: &str, msg: impl std::fmt::Display) -> Self {
        let envelope = serde_json::json!({
            "ok": false,
            "error": { "code": code, "message": msg.to_string() }
        });
        Self {
            output: envelope.to_string(),
            is_error: true,
        }
    }

    /// Create an invalid-parameters error.
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("invalid_parameters", msg)
    }

    /// Wrap a storage failure with its stable code.
    pub fn from_fs_error(err: &FsError) -> Self {
        Self::error_with_code(err.code(), err)
    }
}

impl From<FsError> for ToolResult {
    fn from(err: FsError) -> Self {
        Self::from_fs_error(&err)
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::invalid_parameters(format!("Invalid parameters: {}", e)))
}

/// Tool definition exposed to the driving loop.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Context for tool execution
///
/// Carries the active storage backend and plan for the owning stack.
/// Tools hold no cross-call state of their own; everything stateful
/// lives here or behind the backend.
#[derive(Clone)]
pub struct ToolContext {
    /// Active storage backend (may be a composite)
    pub store: Arc<dyn StorageBackend>,
    /// Plan state for this execution
    pub todos: Arc<TodoList>,
    /// Model name in effect, inherited by sub-agents unless overridden
    pub model: Option<String>,
    /// Optional per-call timeout override
    pub timeout: Option<Duration>,
    /// Nesting depth (0 = root agent)
    pub depth: usize,
}

impl ToolContext {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self {
            store,
            todos: Arc::new(TodoList::new()),
            model: None,
            timeout: None,
            depth: 0,
        }
    }

    pub fn with_todos(mut self, todos: Arc<TodoList>) -> Self {
        self.todos = todos;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description shown to the model
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Registry for managing tools with hook support
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
    default_timeout: Duration,
    pre_hooks: Vec<Arc<dyn PreToolHook>>,
    post_hooks: Vec<Arc<dyn PostToolHook>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            default_timeout: DEFAULT_TOOL_TIMEOUT,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    /// Register a tool
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        tools.insert(name, tool);
    }

    /// Add a pre-execution hook (runs in registration order)
    pub fn add_pre_hook(&mut self, hook: Arc<dyn PreToolHook>) {
        self.pre_hooks.push(hook);
    }

    /// Add a post-execution hook
    pub fn add_post_hook(&mut self, hook: Arc<dyn PostToolHook>) {
        self.post_hooks.push(hook);
    }

    /// Get a tool by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// All tool definitions, ordered by name for a stable schema listing
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut defs: Vec<ToolDefinition> = tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name with hooks and timeout.
    /// Returns `None` if no tool with that name is registered.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> Option<ToolResult> {
        let tool = self.get(name).await?;
        let timeout = ctx.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        for hook in &self.pre_hooks {
            match hook.before_execute(name, &params, ctx).await {
                HookResult::Continue => {}
                HookResult::Block { reason } => {
                    tracing::info!(tool = name, reason = %reason, "Pre-hook blocked execution");
                    return Some(ToolResult::error_with_code("blocked_by_policy", reason));
                }
            }
        }

        let result = match tokio::time::timeout(timeout, tool.execute(params.clone(), ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::error_with_code(
                    "timeout",
                    format!("Tool '{}' timed out after {} seconds", name, timeout.as_secs()),
                )
            }
        };

        let duration = start.elapsed();
        for hook in &self.post_hooks {
            let _ = hook.after_execute(name, &params, &result, duration).await;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn test_ctx() -> ToolContext {
        ToolContext::new(Arc::new(MemoryBackend::new()))
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo params back"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "additionalProperties": true })
        }
        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::success(params.to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps past any reasonable timeout"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ToolResult::success("never")
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_none() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing", json!({}), &test_ctx()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn execute_runs_registered_tool() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;

        let result = registry
            .execute("echo", json!({"k": 1}), &test_ctx())
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.output.contains("\"k\":1"));
    }

    #[tokio::test]
    async fn tool_definitions_are_sorted() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        let defs = registry.tool_definitions().await;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].description, "Echo params back");
    }

    struct DenyAll;

    #[async_trait]
    impl PreToolHook for DenyAll {
        async fn before_execute(
            &self,
            _name: &str,
            _params: &Value,
            _ctx: &ToolContext,
        ) -> HookResult {
            HookResult::Block {
                reason: "policy says no".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn pre_hook_block_short_circuits_execution() {
        let mut registry = ToolRegistry::new();
        registry.add_pre_hook(Arc::new(DenyAll));
        registry.register(Arc::new(EchoTool)).await;

        let result = registry.execute("echo", json!({}), &test_ctx()).await.unwrap();
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "blocked_by_policy");
        assert_eq!(parsed["error"]["message"], "policy says no");
    }

    #[tokio::test]
    async fn slow_tool_maps_to_a_timeout_error() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool)).await;

        let mut ctx = test_ctx();
        ctx.timeout = Some(Duration::from_millis(20));

        let result = registry.execute("slow", json!({}), &ctx).await.unwrap();
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "timeout");
    }

    #[tokio::test]
    async fn error_envelope_carries_code_and_message() {
        let result = ToolResult::error_with_code("no_match", "nothing to replace");
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["error"]["code"], "no_match");
        assert_eq!(parsed["error"]["message"], "nothing to replace");
    }

    #[tokio::test]
    async fn fs_error_maps_to_stable_code() {
        let result = ToolResult::from(FsError::NotFound("x.txt".into()));
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn parse_params_rejects_wrong_types() {
        #[derive(serde::Deserialize, Debug)]
        struct Params {
            #[serde(rename = "name")]
            _name: String,
        }

        let result: Result<Params, ToolResult> = parse_params(json!({"name": 42}));
        let err = result.unwrap_err();
        assert!(err.is_error);
        let parsed: Value = serde_json::from_str(&err.output).unwrap();
        assert_eq!(parsed["error"]["code"], "invalid_parameters");
    }

    #[tokio::test]
    async fn categories_split_read_and_write() {
        assert_eq!(tool_category("read_file"), ToolCategory::ReadOnly);
        assert_eq!(tool_category("write_file"), ToolCategory::Write);
        assert_eq!(tool_category("task"), ToolCategory::Dispatch);
    }
}
