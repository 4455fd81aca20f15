//! Tidepool - stateful middleware for long-horizon agents
//!
//! Sits between a model-driven tool-calling loop and tool execution,
//! providing the state that loop cannot keep in its context window:
//!
//! - **Virtual file system** with pluggable backends: ephemeral memory,
//!   a durable SQLite keyed store, a real directory tree, and a
//!   composite that routes by path prefix ([`backend`])
//! - **Filesystem tools** (ls, read, write, exact-match edit, glob,
//!   grep) built purely on the backend contract ([`tools`])
//! - **Sub-agent dispatch**: the `task` tool spawns isolated nested
//!   executions with bounded step budgets ([`subagent`])
//! - **Plan state**: an ordered todo list replaced wholesale by the
//!   `write_todos` tool ([`plan`])
//! - **Interrupt gate**: pause configured tool calls for an external
//!   approve/edit/reject decision, with serializable paused state
//!   ([`interrupt`])
//!
//! [`stack::AgentStack`] assembles all of it behind two calls the
//! driving loop needs: `dispatch` and `resume`.

pub mod backend;
pub mod config;
pub mod interrupt;
pub mod plan;
pub mod stack;
pub mod subagent;
pub mod tools;

pub use backend::{
    CompositeBackend, DirectoryBackend, FsError, FsResult, GrepMatch, KeyedBackend,
    MemoryBackend, ReadWindow, StorageBackend,
};
pub use config::{build_backend, BackendKind, RouteConfig, StackConfig, StorageConfig};
pub use interrupt::{
    Decision, GateCheckpoint, GateError, GateState, InterruptDecision, InterruptGate,
    InterruptPolicy, PendingCall, Resolution,
};
pub use plan::{Todo, TodoList, TodoStatus};
pub use stack::{AgentStack, Dispatch, StackBuilder, ToolCall};
pub use subagent::{AgentLoop, DispatchError, LoopOutcome, SubAgentRegistry, SubAgentSpec};
pub use tools::{Tool, ToolContext, ToolDefinition, ToolRegistry, ToolResult};
