//! Sub-agent specifications and the driving-loop contract
//!
//! A sub-agent is a named specification the parent model can dispatch a
//! bounded task to. The loop that actually drives the model is a black
//! box behind `AgentLoop`: given an isolated stack, a system prompt, and
//! instructions, it runs until it produces a final answer or exhausts
//! its step budget. Budget exhaustion is recoverable - the outcome
//! carries the best partial answer plus a flag.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::interrupt::InterruptPolicy;
use crate::stack::AgentStack;
use crate::tools::hooks::{PostToolHook, PreToolHook};

/// Immutable specification of a dispatchable sub-agent.
#[derive(Clone)]
pub struct SubAgentSpec {
    /// Unique within the parent's registry
    pub name: String,
    /// Shown to the parent model so it can decide when to dispatch
    pub description: String,
    pub system_prompt: String,
    /// Tool names this sub-agent gets; `None` inherits the parent's set
    pub tools: Option<Vec<String>>,
    /// Model override; `None` inherits the parent's
    pub model: Option<String>,
    /// Interrupt policy for the nested stack; `None` means ungated
    pub interrupt_on: Option<InterruptPolicy>,
    /// Hooks installed on the nested stack's registry
    pub pre_hooks: Vec<Arc<dyn PreToolHook>>,
    pub post_hooks: Vec<Arc<dyn PostToolHook>>,
}

impl fmt::Debug for SubAgentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubAgentSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tools", &self.tools)
            .field("model", &self.model)
            .field("interrupt_on", &self.interrupt_on)
            .field("pre_hooks", &self.pre_hooks.len())
            .field("post_hooks", &self.post_hooks.len())
            .finish_non_exhaustive()
    }
}

impl SubAgentSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: None,
            model: None,
            interrupt_on: None,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_interrupts(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_on = Some(policy);
        self
    }

    pub fn with_pre_hook(mut self, hook: Arc<dyn PreToolHook>) -> Self {
        self.pre_hooks.push(hook);
        self
    }

    pub fn with_post_hook(mut self, hook: Arc<dyn PostToolHook>) -> Self {
        self.post_hooks.push(hook);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown subagent {name:?} (available: {available})")]
    UnknownSubagent { name: String, available: String },

    #[error("dispatch depth {depth} exceeds the configured maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownSubagent { .. } => "unknown_subagent",
            DispatchError::DepthExceeded { .. } => "depth_exceeded",
        }
    }
}

/// Registry of sub-agent specifications for one parent configuration.
/// Specs are immutable once registered.
#[derive(Default)]
pub struct SubAgentRegistry {
    specs: HashMap<String, Arc<SubAgentSpec>>,
}

impl SubAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: SubAgentSpec) -> anyhow::Result<()> {
        if self.specs.contains_key(&spec.name) {
            anyhow::bail!("subagent {:?} is already registered", spec.name);
        }
        self.specs.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<SubAgentSpec>, DispatchError> {
        self.specs
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownSubagent {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Outcome of one nested execution.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The final (or best partial) text answer
    pub answer: String,
    pub steps_used: usize,
    /// True when the step budget ran out before a final answer
    pub budget_exhausted: bool,
}

/// The external driving loop, treated as a black-box collaborator.
///
/// Implementations own model invocation and message accumulation; the
/// middleware only hands them a stack to call tools through. Dropping
/// the returned future abandons the nested execution - no cancellation
/// signal is propagated into it.
#[async_trait]
pub trait AgentLoop: Send + Sync {
    async fn run(
        &self,
        stack: Arc<AgentStack>,
        system_prompt: String,
        instructions: String,
        step_budget: usize,
    ) -> anyhow::Result<LoopOutcome>;
}
