//! Interrupt gate
//!
//! Pauses configured tool calls until an external decision arrives
//! (approve, edit, or reject). The gate is an explicit, serializable
//! state machine - Running, Paused, Resumed - so a pause can outlive the
//! process that created it: checkpoint the gate, deliver the decision
//! from anywhere, restore, resume.
//!
//! Multiple calls may pause in one turn; they queue FIFO and must be
//! resolved in the order they were issued.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// A decision an external caller can take on a paused call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Edit,
    Reject,
}

/// Maps tool names to the decision set an external caller may take.
/// Tools without an entry execute unconditionally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterruptPolicy {
    rules: HashMap<String, Vec<Decision>>,
}

impl InterruptPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate `tool` on the given decision set.
    pub fn gate(mut self, tool: impl Into<String>, decisions: Vec<Decision>) -> Self {
        self.rules.insert(tool.into(), decisions);
        self
    }

    /// Gate `tool` on the full approve/edit/reject set.
    pub fn gate_all(self, tool: impl Into<String>) -> Self {
        self.gate(tool, vec![Decision::Approve, Decision::Edit, Decision::Reject])
    }

    pub fn intercepts(&self, tool: &str) -> bool {
        self.rules.contains_key(tool)
    }

    pub fn allows(&self, tool: &str, decision: Decision) -> bool {
        self.rules
            .get(tool)
            .map(|set| set.contains(&decision))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Gate state. `Resumed` is transient: recorded when the pending queue
/// drains, collapsing back to `Running` on the next check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Running,
    Paused,
    Resumed,
}

/// A tool call suspended by the gate, surfaced to the external caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A decision delivered through the interrupt channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptDecision {
    pub tool_call_id: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What the owning stack should do after a decision resolves.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Run the tool (original or replacement arguments).
    Execute { name: String, arguments: Value },
    /// Do not run the tool; return a failure carrying the reason.
    Synthesize { name: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("no paused call with id {0:?}")]
    UnknownCall(String),

    #[error("call {actual:?} resolved out of order; {expected:?} was issued first")]
    OutOfOrder { expected: String, actual: String },

    #[error("decision {decision:?} is not allowed for tool {tool:?}")]
    DecisionNotAllowed { tool: String, decision: Decision },

    #[error("edit decision for {0:?} carried no replacement arguments")]
    MissingReplacement(String),
}

/// Serializable snapshot of a gate, suitable for durable checkpointing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheckpoint {
    pub policy: InterruptPolicy,
    pub state: GateState,
    pub pending: Vec<PendingCall>,
}

#[derive(Debug)]
struct GateInner {
    state: GateState,
    pending: VecDeque<PendingCall>,
}

pub struct InterruptGate {
    policy: InterruptPolicy,
    inner: Mutex<GateInner>,
}

impl InterruptGate {
    pub fn new(policy: InterruptPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(GateInner {
                state: GateState::Running,
                pending: VecDeque::new(),
            }),
        }
    }

    pub fn policy(&self) -> &InterruptPolicy {
        &self.policy
    }

    pub fn state(&self) -> GateState {
        self.inner.lock().state
    }

    /// Calls currently awaiting a decision, oldest first.
    pub fn pending(&self) -> Vec<PendingCall> {
        self.inner.lock().pending.iter().cloned().collect()
    }

    /// Whether a call to `tool` must pause for a decision.
    pub fn intercepts(&self, tool: &str) -> bool {
        let intercepted = self.policy.intercepts(tool);
        if !intercepted {
            // A transient Resumed state collapses once execution moves on.
            let mut inner = self.inner.lock();
            if inner.state == GateState::Resumed {
                inner.state = GateState::Running;
            }
        }
        intercepted
    }

    /// Suspend `call` pending an external decision.
    pub fn pause(&self, call: PendingCall) -> PendingCall {
        let mut inner = self.inner.lock();
        inner.state = GateState::Paused;
        inner.pending.push_back(call.clone());
        tracing::info!(tool = %call.name, call_id = %call.id, "Paused tool call for decision");
        call
    }

    /// Resolve the oldest pending call. Decisions must arrive in issue
    /// order and be in the policy's allowed set for the tool.
    pub fn resolve(&self, decision: InterruptDecision) -> Result<Resolution, GateError> {
        let mut inner = self.inner.lock();

        let front = inner
            .pending
            .front()
            .ok_or_else(|| GateError::UnknownCall(decision.tool_call_id.clone()))?;

        if front.id != decision.tool_call_id {
            if !inner.pending.iter().any(|c| c.id == decision.tool_call_id) {
                return Err(GateError::UnknownCall(decision.tool_call_id));
            }
            return Err(GateError::OutOfOrder {
                expected: front.id.clone(),
                actual: decision.tool_call_id,
            });
        }

        if !self.policy.allows(&front.name, decision.decision) {
            return Err(GateError::DecisionNotAllowed {
                tool: front.name.clone(),
                decision: decision.decision,
            });
        }

        if decision.decision == Decision::Edit && decision.replacement_arguments.is_none() {
            return Err(GateError::MissingReplacement(front.id.clone()));
        }

        // Validated against the front; now consume it.
        let call = inner
            .pending
            .pop_front()
            .ok_or_else(|| GateError::UnknownCall("empty queue".into()))?;
        inner.state = if inner.pending.is_empty() {
            GateState::Resumed
        } else {
            GateState::Paused
        };
        tracing::info!(
            tool = %call.name,
            call_id = %call.id,
            decision = ?decision.decision,
            "Resolved paused tool call"
        );

        match decision.decision {
            Decision::Approve => Ok(Resolution::Execute {
                name: call.name,
                arguments: call.arguments,
            }),
            Decision::Edit => {
                // Presence checked above, before the call was consumed.
                let arguments = decision
                    .replacement_arguments
                    .ok_or(GateError::MissingReplacement(call.id))?;
                Ok(Resolution::Execute {
                    name: call.name,
                    arguments,
                })
            }
            Decision::Reject => Ok(Resolution::Synthesize {
                name: call.name,
                reason: decision
                    .reason
                    .unwrap_or_else(|| "rejected by external decision".to_string()),
            }),
        }
    }

    /// Snapshot the gate for durable storage.
    pub fn checkpoint(&self) -> GateCheckpoint {
        let inner = self.inner.lock();
        GateCheckpoint {
            policy: self.policy.clone(),
            state: inner.state,
            pending: inner.pending.iter().cloned().collect(),
        }
    }

    /// Reconstruct a gate from a checkpoint, possibly in another process.
    pub fn from_checkpoint(checkpoint: GateCheckpoint) -> Self {
        Self {
            policy: checkpoint.policy,
            inner: Mutex::new(GateInner {
                state: checkpoint.state,
                pending: checkpoint.pending.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gated() -> InterruptGate {
        InterruptGate::new(InterruptPolicy::new().gate_all("write_file"))
    }

    fn call(id: &str) -> PendingCall {
        PendingCall {
            id: id.to_string(),
            name: "write_file".to_string(),
            arguments: json!({"file_path": "a", "content": "b"}),
        }
    }

    fn decision(id: &str, d: Decision) -> InterruptDecision {
        InterruptDecision {
            tool_call_id: id.to_string(),
            decision: d,
            replacement_arguments: None,
            reason: None,
        }
    }

    #[test]
    fn ungated_tools_pass_through() {
        let gate = gated();
        assert!(!gate.intercepts("read_file"));
        assert!(gate.intercepts("write_file"));
    }

    #[test]
    fn pause_then_approve_executes_original_args() {
        let gate = gated();
        gate.pause(call("c1"));
        assert_eq!(gate.state(), GateState::Paused);

        let resolution = gate.resolve(decision("c1", Decision::Approve)).unwrap();
        match resolution {
            Resolution::Execute { name, arguments } => {
                assert_eq!(name, "write_file");
                assert_eq!(arguments["content"], "b");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(gate.state(), GateState::Resumed);
        assert!(!gate.intercepts("read_file"));
        assert_eq!(gate.state(), GateState::Running);
    }

    #[test]
    fn edit_uses_replacement_args() {
        let gate = gated();
        gate.pause(call("c1"));

        let resolution = gate
            .resolve(InterruptDecision {
                tool_call_id: "c1".into(),
                decision: Decision::Edit,
                replacement_arguments: Some(json!({"file_path": "a", "content": "edited"})),
                reason: None,
            })
            .unwrap();
        match resolution {
            Resolution::Execute { arguments, .. } => assert_eq!(arguments["content"], "edited"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn edit_without_replacement_is_an_error() {
        let gate = gated();
        gate.pause(call("c1"));
        let err = gate.resolve(decision("c1", Decision::Edit)).unwrap_err();
        assert!(matches!(err, GateError::MissingReplacement(_)));
    }

    #[test]
    fn reject_synthesizes_reason() {
        let gate = gated();
        gate.pause(call("c1"));

        let resolution = gate
            .resolve(InterruptDecision {
                tool_call_id: "c1".into(),
                decision: Decision::Reject,
                replacement_arguments: None,
                reason: Some("not allowed".into()),
            })
            .unwrap();
        match resolution {
            Resolution::Synthesize { reason, .. } => assert_eq!(reason, "not allowed"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn resumption_follows_issue_order() {
        let gate = gated();
        gate.pause(call("first"));
        gate.pause(call("second"));

        let err = gate
            .resolve(decision("second", Decision::Approve))
            .unwrap_err();
        assert!(matches!(err, GateError::OutOfOrder { .. }));

        gate.resolve(decision("first", Decision::Approve)).unwrap();
        assert_eq!(gate.state(), GateState::Paused);
        gate.resolve(decision("second", Decision::Approve)).unwrap();
        assert_eq!(gate.state(), GateState::Resumed);
    }

    #[test]
    fn unknown_call_is_rejected() {
        let gate = gated();
        gate.pause(call("c1"));
        let err = gate.resolve(decision("ghost", Decision::Approve)).unwrap_err();
        assert!(matches!(err, GateError::UnknownCall(_)));
    }

    #[test]
    fn disallowed_decision_is_rejected() {
        let gate =
            InterruptGate::new(InterruptPolicy::new().gate("write_file", vec![Decision::Approve]));
        gate.pause(call("c1"));

        let err = gate.resolve(decision("c1", Decision::Reject)).unwrap_err();
        assert!(matches!(err, GateError::DecisionNotAllowed { .. }));
        // the call is still pending after a bad decision
        assert_eq!(gate.pending().len(), 1);
    }

    #[test]
    fn checkpoint_roundtrips_through_json() {
        let gate = gated();
        gate.pause(call("c1"));

        let json = serde_json::to_string(&gate.checkpoint()).unwrap();
        let restored: GateCheckpoint = serde_json::from_str(&json).unwrap();
        let gate2 = InterruptGate::from_checkpoint(restored);

        assert_eq!(gate2.state(), GateState::Paused);
        assert_eq!(gate2.pending().len(), 1);
        let resolution = gate2.resolve(decision("c1", Decision::Approve)).unwrap();
        assert!(matches!(resolution, Resolution::Execute { .. }));
    }
}
