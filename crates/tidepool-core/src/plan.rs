//! Plan state
//!
//! The plan is an ordered todo list the model maintains while it works.
//! The `write_todos` tool replaces the whole list on every call, so
//! ordering and statuses are fully determined by the most recent call.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Status of a single plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    fn rank(self) -> u8 {
        match self {
            TodoStatus::Pending => 0,
            TodoStatus::InProgress => 1,
            TodoStatus::Completed => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
}

/// The ordered plan, shared across the owning stack.
///
/// Lifetime equals the stack's: a sub-agent gets a fresh list and its
/// entries never leak into the parent's.
#[derive(Default)]
pub struct TodoList {
    entries: RwLock<Vec<Todo>>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire plan. Returns notes about back-transitions
    /// (completed -> pending etc.); those are suspicious, not invalid,
    /// so the replacement always goes through.
    pub fn replace(&self, entries: Vec<Todo>) -> Vec<String> {
        let mut warnings = Vec::new();
        {
            let old = self.entries.read();
            for entry in &entries {
                if let Some(prev) = old.iter().find(|t| t.id == entry.id) {
                    if entry.status.rank() < prev.status.rank() {
                        warnings.push(format!(
                            "todo {:?} moved backwards: {:?} -> {:?}",
                            entry.id, prev.status, entry.status
                        ));
                    }
                }
            }
        }
        *self.entries.write() = entries;
        warnings
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.entries.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// (completed, total) for progress displays.
    pub fn progress(&self) -> (usize, usize) {
        let entries = self.entries.read();
        let done = entries
            .iter()
            .filter(|t| t.status == TodoStatus::Completed)
            .count();
        (done, entries.len())
    }
}
