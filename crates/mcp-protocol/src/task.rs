//! Task metadata (spec §3, "Task").

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::Kind;

/// The lifecycle state of a backgrounded invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Working,
    Completed,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled | TaskState::Failed)
    }
}

/// Metadata for a backgrounded invocation. The core holds only this; the
/// durable queue (an external collaborator, spec §1) owns the authoritative
/// copy and its persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub kind: TaskKindWire,
    pub target_key: String,
    pub arguments: Value,
    pub state: TaskState,
    pub created_at: String,
    pub ttl: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// The session the original request belonged to, carried through so the
    /// worker can re-establish a session-scoped `Context` (spec §4.11:
    /// "re-establishes a request context with the stored task metadata").
    pub session_id: Option<String>,
}

/// Wire-serializable mirror of `Kind`, restricted to the kinds a task can
/// target (a resource template binds to a concrete URI before becoming a
/// task, so it is represented the same as `Resource` here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKindWire {
    Tool,
    Resource,
    Prompt,
}

impl From<Kind> for TaskKindWire {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Tool => TaskKindWire::Tool,
            Kind::Resource | Kind::ResourceTemplate => TaskKindWire::Resource,
            Kind::Prompt => TaskKindWire::Prompt,
        }
    }
}
