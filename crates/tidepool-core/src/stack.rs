//! Agent stack
//!
//! The facade the driving loop talks to: it exposes the tool set with
//! schemas, routes each tool call through the interrupt gate, executes
//! against the registry, and resumes paused calls when decisions arrive.
//! Sub-agent dispatch builds nested stacks through the same builder.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{CompositeBackend, FsError, FsResult, MemoryBackend, StorageBackend};
use crate::interrupt::{
    GateCheckpoint, GateError, InterruptDecision, InterruptGate, InterruptPolicy, PendingCall,
    Resolution,
};
use crate::plan::TodoList;
use crate::subagent::{AgentLoop, SubAgentRegistry};
use crate::tools::fs::{EditFileTool, GlobTool, GrepTool, LsTool, ReadFileTool, WriteFileTool};
use crate::tools::hooks::{PostToolHook, PreToolHook};
use crate::tools::registry::{ToolContext, ToolDefinition, ToolRegistry, ToolResult};
use crate::tools::task::TaskTool;
use crate::tools::todos::WriteTodosTool;

/// A tool call as issued by the driving loop.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Outcome of dispatching one tool call.
#[derive(Debug)]
pub enum Dispatch {
    Completed(ToolResult),
    /// The call is suspended; deliver an `InterruptDecision` to resume.
    Paused(PendingCall),
}

pub struct AgentStack {
    registry: ToolRegistry,
    gate: InterruptGate,
    ctx: ToolContext,
    step_budget: usize,
}

impl AgentStack {
    pub fn builder() -> StackBuilder {
        StackBuilder::new()
    }

    /// Tool definitions for the driving loop, sorted by name.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.tool_definitions().await
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.ctx.store
    }

    pub fn todos(&self) -> &Arc<TodoList> {
        &self.ctx.todos
    }

    pub fn depth(&self) -> usize {
        self.ctx.depth
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    /// Route one tool call through the gate and, unless paused, execute it.
    pub async fn dispatch(&self, call: ToolCall) -> Dispatch {
        if self.gate.intercepts(&call.name) {
            let pending = self.gate.pause(PendingCall {
                id: call.id,
                name: call.name,
                arguments: call.arguments,
            });
            return Dispatch::Paused(pending);
        }
        Dispatch::Completed(self.execute_now(&call.name, call.arguments).await)
    }

    /// Resume the oldest paused call with an external decision.
    pub async fn resume(&self, decision: InterruptDecision) -> Result<ToolResult, GateError> {
        match self.gate.resolve(decision)? {
            Resolution::Execute { name, arguments } => Ok(self.execute_now(&name, arguments).await),
            Resolution::Synthesize { name, reason } => Ok(ToolResult::error_with_code(
                "rejected",
                format!("Tool '{}' was rejected: {}", name, reason),
            )),
        }
    }

    pub fn gate(&self) -> &InterruptGate {
        &self.gate
    }

    /// Persist the gate (pending calls included) to a path on the active
    /// backend, so a paused execution survives this process.
    pub async fn checkpoint_gate_to(&self, path: &str) -> FsResult<()> {
        let checkpoint = self.gate.checkpoint();
        let json = serde_json::to_string_pretty(&checkpoint)
            .map_err(|e| FsError::Io(e.to_string()))?;
        self.ctx.store.write(path, &json).await
    }

    async fn execute_now(&self, name: &str, arguments: Value) -> ToolResult {
        match self.registry.execute(name, arguments, &self.ctx).await {
            Some(result) => result,
            None => ToolResult::error_with_code("unknown_tool", format!("Unknown tool '{}'", name)),
        }
    }
}

/// Builder for an `AgentStack`. Configuration errors (conflicting
/// routes, missing stores) surface here, never during dispatch.
pub struct StackBuilder {
    store: Option<Arc<dyn StorageBackend>>,
    shared_routes: Vec<(String, Arc<dyn StorageBackend>)>,
    policy: InterruptPolicy,
    gate_checkpoint: Option<GateCheckpoint>,
    model: Option<String>,
    tool_timeout: Option<Duration>,
    depth: usize,
    step_budget: usize,
    max_depth: usize,
    subagents: Option<(Arc<SubAgentRegistry>, Arc<dyn AgentLoop>)>,
    tool_filter: Option<Vec<String>>,
    pre_hooks: Vec<Arc<dyn PreToolHook>>,
    post_hooks: Vec<Arc<dyn PostToolHook>>,
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StackBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            shared_routes: Vec::new(),
            policy: InterruptPolicy::new(),
            gate_checkpoint: None,
            model: None,
            tool_timeout: None,
            depth: 0,
            step_budget: 24,
            max_depth: 3,
            subagents: None,
            tool_filter: None,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    /// Use an explicit backend instead of the default ephemeral one.
    pub fn store(mut self, store: Arc<dyn StorageBackend>) -> Self {
        self.store = Some(store);
        self
    }

    /// Prefix routes shared with nested stacks (typically the durable
    /// store). When no explicit store is set, these become routes over a
    /// fresh ephemeral default.
    pub fn shared_route(
        mut self,
        prefix: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        self.shared_routes.push((prefix.into(), backend));
        self
    }

    pub fn interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reconstruct the gate from a checkpoint taken in another process.
    pub fn gate_checkpoint(mut self, checkpoint: GateCheckpoint) -> Self {
        self.gate_checkpoint = Some(checkpoint);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn step_budget(mut self, budget: usize) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Enable the `task` tool with a sub-agent registry and the loop
    /// that drives nested executions.
    pub fn subagents(
        mut self,
        registry: Arc<SubAgentRegistry>,
        driver: Arc<dyn AgentLoop>,
    ) -> Self {
        self.subagents = Some((registry, driver));
        self
    }

    /// Restrict the registered tools to these names.
    pub fn tool_filter(mut self, tools: Vec<String>) -> Self {
        self.tool_filter = Some(tools);
        self
    }

    pub fn pre_hook(mut self, hook: Arc<dyn PreToolHook>) -> Self {
        self.pre_hooks.push(hook);
        self
    }

    pub fn post_hook(mut self, hook: Arc<dyn PostToolHook>) -> Self {
        self.post_hooks.push(hook);
        self
    }

    pub async fn build(self) -> anyhow::Result<Arc<AgentStack>> {
        let store: Arc<dyn StorageBackend> = match (self.store, self.shared_routes.is_empty()) {
            (Some(store), true) => store,
            (Some(store), false) => {
                let mut builder = CompositeBackend::builder(store);
                for (prefix, backend) in &self.shared_routes {
                    builder = builder.route(prefix.clone(), backend.clone())?;
                }
                Arc::new(builder.build())
            }
            (None, true) => Arc::new(MemoryBackend::new()),
            (None, false) => {
                let mut builder =
                    CompositeBackend::builder(Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>);
                for (prefix, backend) in &self.shared_routes {
                    builder = builder.route(prefix.clone(), backend.clone())?;
                }
                Arc::new(builder.build())
            }
        };

        let mut registry = ToolRegistry::new();
        for hook in self.pre_hooks {
            registry.add_pre_hook(hook);
        }
        for hook in self.post_hooks {
            registry.add_post_hook(hook);
        }

        let keep = |name: &str| -> bool {
            self.tool_filter
                .as_ref()
                .map(|f| f.iter().any(|t| t == name))
                .unwrap_or(true)
        };

        if keep("ls") {
            registry.register(Arc::new(LsTool)).await;
        }
        if keep("read_file") {
            registry.register(Arc::new(ReadFileTool)).await;
        }
        if keep("write_file") {
            registry.register(Arc::new(WriteFileTool)).await;
        }
        if keep("edit_file") {
            registry.register(Arc::new(EditFileTool)).await;
        }
        if keep("glob") {
            registry.register(Arc::new(GlobTool)).await;
        }
        if keep("grep") {
            registry.register(Arc::new(GrepTool)).await;
        }
        if keep("write_todos") {
            registry.register(Arc::new(WriteTodosTool)).await;
        }
        if let Some((subagents, driver)) = &self.subagents {
            if keep("task") {
                registry
                    .register(Arc::new(TaskTool::new(
                        subagents.clone(),
                        driver.clone(),
                        self.shared_routes.clone(),
                        self.tool_filter.clone(),
                        self.step_budget,
                        self.max_depth,
                    )))
                    .await;
            }
        }

        let mut ctx = ToolContext::new(store).with_depth(self.depth);
        ctx.model = self.model;
        ctx.timeout = self.tool_timeout;

        let gate = match self.gate_checkpoint {
            Some(checkpoint) => InterruptGate::from_checkpoint(checkpoint),
            None => InterruptGate::new(self.policy),
        };

        Ok(Arc::new(AgentStack {
            registry,
            gate,
            ctx,
            step_budget: self.step_budget,
        }))
    }
}
