//! task tool - sub-agent dispatch
//!
//! Spawns an isolated nested execution: a fresh ephemeral filesystem
//! (plus any shared durable routes), a fresh plan, and a conversation
//! seeded only with the sub-agent's system prompt and the task
//! description. The parent blocks until the nested loop finishes and
//! receives exactly one bounded text summary back.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::StorageBackend;
use crate::stack::AgentStack;
use crate::subagent::{AgentLoop, DispatchError, SubAgentRegistry};
use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub struct TaskTool {
    subagents: Arc<SubAgentRegistry>,
    driver: Arc<dyn AgentLoop>,
    /// Routes every nested stack shares with the parent (durable store)
    shared_routes: Vec<(String, Arc<dyn StorageBackend>)>,
    /// The parent's effective tool set; specs without their own list
    /// inherit this, so a restricted parent cannot spawn a wider child.
    parent_tools: Option<Vec<String>>,
    step_budget: usize,
    max_depth: usize,
}

impl TaskTool {
    pub fn new(
        subagents: Arc<SubAgentRegistry>,
        driver: Arc<dyn AgentLoop>,
        shared_routes: Vec<(String, Arc<dyn StorageBackend>)>,
        parent_tools: Option<Vec<String>>,
        step_budget: usize,
        max_depth: usize,
    ) -> Self {
        Self {
            subagents,
            driver,
            shared_routes,
            parent_tools,
            step_budget,
            max_depth,
        }
    }

    fn describe_registry(&self) -> String {
        self.subagents
            .names()
            .into_iter()
            .map(|name| {
                self.subagents
                    .get(&name)
                    .map(|spec| format!("- {}: {}", spec.name, spec.description))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize)]
struct Params {
    subagent_type: String,
    description: String,
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Dispatch a bounded subtask to a named sub-agent. The sub-agent works in isolation and returns a single text summary."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subagent_type": {
                    "type": "string",
                    "description": format!("Which sub-agent to dispatch. Available:\n{}", self.describe_registry())
                },
                "description": {
                    "type": "string",
                    "description": "The task for the sub-agent to perform"
                }
            },
            "required": ["subagent_type", "description"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let spec = match self.subagents.get(&params.subagent_type) {
            Ok(spec) => spec,
            Err(e) => return ToolResult::error_with_code(e.code(), e),
        };

        let depth = ctx.depth + 1;
        if depth > self.max_depth {
            let e = DispatchError::DepthExceeded {
                depth,
                max: self.max_depth,
            };
            return ToolResult::error_with_code(e.code(), e);
        }

        let mut builder = AgentStack::builder()
            .depth(depth)
            .step_budget(self.step_budget)
            .max_depth(self.max_depth)
            .subagents(self.subagents.clone(), self.driver.clone());
        for (prefix, backend) in &self.shared_routes {
            builder = builder.shared_route(prefix.clone(), backend.clone());
        }
        if let Some(tools) = spec.tools.clone().or_else(|| self.parent_tools.clone()) {
            builder = builder.tool_filter(tools);
        }
        if let Some(policy) = &spec.interrupt_on {
            builder = builder.interrupt_policy(policy.clone());
        }
        for hook in &spec.pre_hooks {
            builder = builder.pre_hook(hook.clone());
        }
        for hook in &spec.post_hooks {
            builder = builder.post_hook(hook.clone());
        }
        if let Some(model) = spec.model.clone().or_else(|| ctx.model.clone()) {
            builder = builder.model(model);
        }
        if let Some(timeout) = ctx.timeout {
            builder = builder.tool_timeout(timeout);
        }

        let child = match builder.build().await {
            Ok(stack) => stack,
            Err(e) => return ToolResult::error_with_code("configuration_error", e),
        };

        tracing::info!(
            subagent = %spec.name,
            depth,
            budget = self.step_budget,
            "Dispatching sub-agent"
        );

        match self
            .driver
            .run(
                child,
                spec.system_prompt.clone(),
                params.description,
                self.step_budget,
            )
            .await
        {
            Ok(outcome) => {
                let mut warnings = Vec::new();
                if outcome.budget_exhausted {
                    warnings.push(format!(
                        "sub-agent hit its step budget of {}; result is partial",
                        self.step_budget
                    ));
                }
                ToolResult::success_data_with(
                    json!({
                        "result": outcome.answer,
                        "subagent": spec.name,
                        "steps_used": outcome.steps_used,
                        "budget_exhausted": outcome.budget_exhausted
                    }),
                    warnings,
                )
            }
            Err(e) => ToolResult::error_with_code("subagent_failed", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::subagent::{LoopOutcome, SubAgentSpec};
    use crate::tools::registry::ToolContext;

    /// Scripted loop: runs each instruction as literal tool calls would
    /// be overkill here, so it writes one file and answers.
    struct ScriptedLoop {
        budget_exhausted: bool,
    }

    #[async_trait]
    impl AgentLoop for ScriptedLoop {
        async fn run(
            &self,
            stack: Arc<AgentStack>,
            _system_prompt: String,
            instructions: String,
            _step_budget: usize,
        ) -> anyhow::Result<LoopOutcome> {
            stack
                .store()
                .write("/scratch/child.txt", "child state")
                .await?;
            stack
                .store()
                .write("/memories/finding.md", &instructions)
                .await?;
            Ok(LoopOutcome {
                answer: format!("done: {}", instructions),
                steps_used: 2,
                budget_exhausted: self.budget_exhausted,
            })
        }
    }

    fn registry() -> Arc<SubAgentRegistry> {
        let mut reg = SubAgentRegistry::new();
        reg.register(SubAgentSpec::new(
            "researcher",
            "investigates things",
            "You investigate.",
        ))
        .unwrap();
        Arc::new(reg)
    }

    fn parsed(result: &ToolResult) -> Value {
        serde_json::from_str(&result.output).unwrap()
    }

    #[tokio::test]
    async fn unknown_subagent_is_a_structured_failure() {
        let tool = TaskTool::new(
            registry(),
            Arc::new(ScriptedLoop {
                budget_exhausted: false,
            }),
            Vec::new(),
            None,
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        let result = tool
            .execute(
                json!({"subagent_type": "ghost", "description": "x"}),
                &ctx,
            )
            .await;
        assert!(result.is_error);
        let body = parsed(&result);
        assert_eq!(body["error"]["code"], "unknown_subagent");
        assert!(body["error"]["message"].as_str().unwrap().contains("researcher"));
    }

    #[tokio::test]
    async fn dispatch_returns_a_single_text_summary() {
        let tool = TaskTool::new(
            registry(),
            Arc::new(ScriptedLoop {
                budget_exhausted: false,
            }),
            Vec::new(),
            None,
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        let result = tool
            .execute(
                json!({"subagent_type": "researcher", "description": "find the thing"}),
                &ctx,
            )
            .await;
        assert!(!result.is_error);
        let body = parsed(&result);
        assert_eq!(body["data"]["result"], "done: find the thing");
        assert_eq!(body["data"]["budget_exhausted"], false);
    }

    #[tokio::test]
    async fn subagent_ephemeral_writes_stay_isolated() {
        let parent_store = Arc::new(MemoryBackend::new());
        let tool = TaskTool::new(
            registry(),
            Arc::new(ScriptedLoop {
                budget_exhausted: false,
            }),
            Vec::new(),
            None,
            8,
            3,
        );
        let ctx = ToolContext::new(parent_store.clone());

        tool.execute(
            json!({"subagent_type": "researcher", "description": "x"}),
            &ctx,
        )
        .await;

        // the child wrote to its own ephemeral store, not the parent's
        assert!(!parent_store.exists("/scratch/child.txt").await.unwrap());
    }

    #[tokio::test]
    async fn shared_durable_route_is_visible_to_parent() {
        let durable: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let tool = TaskTool::new(
            registry(),
            Arc::new(ScriptedLoop {
                budget_exhausted: false,
            }),
            vec![("/memories/".to_string(), durable.clone())],
            None,
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        tool.execute(
            json!({"subagent_type": "researcher", "description": "remember me"}),
            &ctx,
        )
        .await;

        assert_eq!(
            durable.load("/memories/finding.md").await.unwrap(),
            "remember me"
        );
    }

    #[tokio::test]
    async fn budget_exhaustion_is_recoverable_with_warning() {
        let tool = TaskTool::new(
            registry(),
            Arc::new(ScriptedLoop {
                budget_exhausted: true,
            }),
            Vec::new(),
            None,
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        let result = tool
            .execute(
                json!({"subagent_type": "researcher", "description": "long task"}),
                &ctx,
            )
            .await;
        assert!(!result.is_error);
        let body = parsed(&result);
        assert_eq!(body["data"]["budget_exhausted"], true);
        assert!(body["warnings"][0].as_str().unwrap().contains("step budget"));
    }

    #[tokio::test]
    async fn depth_ceiling_blocks_runaway_recursion() {
        let tool = TaskTool::new(
            registry(),
            Arc::new(ScriptedLoop {
                budget_exhausted: false,
            }),
            Vec::new(),
            None,
            8,
            2,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new())).with_depth(2);

        let result = tool
            .execute(
                json!({"subagent_type": "researcher", "description": "x"}),
                &ctx,
            )
            .await;
        assert!(result.is_error);
        assert_eq!(parsed(&result)["error"]["code"], "depth_exceeded");
    }

    /// Answers with the child stack's registered tool names.
    struct ToolListingLoop;

    #[async_trait]
    impl AgentLoop for ToolListingLoop {
        async fn run(
            &self,
            stack: Arc<AgentStack>,
            _system_prompt: String,
            _instructions: String,
            _step_budget: usize,
        ) -> anyhow::Result<LoopOutcome> {
            let names: Vec<String> = stack
                .tool_definitions()
                .await
                .into_iter()
                .map(|d| d.name)
                .collect();
            Ok(LoopOutcome {
                answer: names.join(","),
                steps_used: 1,
                budget_exhausted: false,
            })
        }
    }

    #[tokio::test]
    async fn child_without_own_tools_inherits_the_parent_set() {
        let tool = TaskTool::new(
            registry(),
            Arc::new(ToolListingLoop),
            Vec::new(),
            Some(vec!["read_file".into(), "ls".into(), "task".into()]),
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        let result = tool
            .execute(
                json!({"subagent_type": "researcher", "description": "x"}),
                &ctx,
            )
            .await;
        assert!(!result.is_error);
        // no write tools appear: the restricted parent's set is the ceiling
        assert_eq!(parsed(&result)["data"]["result"], "ls,read_file,task");
    }

    #[tokio::test]
    async fn spec_tool_list_overrides_the_inherited_set() {
        let mut reg = SubAgentRegistry::new();
        reg.register(
            SubAgentSpec::new("scribe", "writes notes", "You write.")
                .with_tools(vec!["write_file".into()]),
        )
        .unwrap();
        let tool = TaskTool::new(
            Arc::new(reg),
            Arc::new(ToolListingLoop),
            Vec::new(),
            Some(vec!["read_file".into(), "task".into()]),
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        let result = tool
            .execute(json!({"subagent_type": "scribe", "description": "x"}), &ctx)
            .await;
        assert_eq!(parsed(&result)["data"]["result"], "write_file");
    }

    /// Attempts a write through the child stack and answers with the
    /// resulting error code (or "ok").
    struct WriteAttemptLoop;

    #[async_trait]
    impl AgentLoop for WriteAttemptLoop {
        async fn run(
            &self,
            stack: Arc<AgentStack>,
            _system_prompt: String,
            _instructions: String,
            _step_budget: usize,
        ) -> anyhow::Result<LoopOutcome> {
            let answer = match stack
                .dispatch(crate::stack::ToolCall::new(
                    "write_file",
                    json!({"file_path": "out.txt", "content": "x"}),
                ))
                .await
            {
                crate::stack::Dispatch::Completed(result) if result.is_error => {
                    let body: Value = serde_json::from_str(&result.output)?;
                    body["error"]["code"].as_str().unwrap_or("unknown").to_string()
                }
                _ => "ok".to_string(),
            };
            Ok(LoopOutcome {
                answer,
                steps_used: 1,
                budget_exhausted: false,
            })
        }
    }

    #[tokio::test]
    async fn spec_hooks_run_on_the_child_stack() {
        let mut reg = SubAgentRegistry::new();
        reg.register(
            SubAgentSpec::new("auditor", "looks, never touches", "You audit.")
                .with_pre_hook(Arc::new(crate::tools::hooks::ReadOnlyHook::new())),
        )
        .unwrap();
        let tool = TaskTool::new(
            Arc::new(reg),
            Arc::new(WriteAttemptLoop),
            Vec::new(),
            None,
            8,
            3,
        );
        let ctx = ToolContext::new(Arc::new(MemoryBackend::new()));

        let result = tool
            .execute(json!({"subagent_type": "auditor", "description": "x"}), &ctx)
            .await;
        assert!(!result.is_error);
        assert_eq!(parsed(&result)["data"]["result"], "blocked_by_policy");
    }
}
