//! write_todos tool
//!
//! The single planning tool: every call replaces the whole plan, so the
//! model re-states the full list whenever anything changes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::plan::{Todo, TodoStatus};
use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub struct WriteTodosTool;

#[derive(Deserialize)]
struct Params {
    todos: Vec<TodoInput>,
}

#[derive(Deserialize)]
struct TodoInput {
    #[serde(default)]
    id: Option<String>,
    content: String,
    #[serde(default)]
    status: TodoStatus,
}

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &str {
        "write_todos"
    }

    fn description(&self) -> &str {
        "Replace the whole plan with an ordered todo list. Always pass every entry; partial updates are not supported."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "The complete ordered plan",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Stable entry id (assigned positionally when omitted)"
                            },
                            "content": {
                                "type": "string",
                                "description": "What this step does"
                            },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"],
                                "default": "pending"
                            }
                        },
                        "required": ["content"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let entries: Vec<Todo> = params
            .todos
            .into_iter()
            .enumerate()
            .map(|(idx, t)| Todo {
                id: t.id.unwrap_or_else(|| (idx + 1).to_string()),
                content: t.content,
                status: t.status,
            })
            .collect();

        let count = entries.len();
        let warnings = ctx.todos.replace(entries);
        let (done, total) = ctx.todos.progress();
        tracing::debug!(entries = count, completed = done, "Replaced plan");

        ToolResult::success_data_with(
            json!({
                "message": format!("Plan updated: {} entr{}", count, if count == 1 { "y" } else { "ies" }),
                "total": total,
                "completed": done
            }),
            warnings,
        )
    }
}
