use async_trait::async_trait;
use serde_json::Value;

use mcp_protocol::task::{Task, TaskKindWire, TaskState};

#[derive(Debug, thiserror::Error)]
pub enum TaskQueueError {
    #[error("task '{0}' not found")]
    NotFound(String),
    #[error("task '{0}' is already in a terminal state")]
    AlreadyTerminal(String),
    #[error("task queue backend error: {0}")]
    Backend(String),
}

/// A unit of submitted work, as the execution engine hands it to the queue
/// (spec §4.11: "submits `(component_key, arguments)` to an external
/// durable queue and returns `TaskCreated(task_id)`").
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub kind: TaskKindWire,
    pub target_key: String,
    pub arguments: Value,
    pub session_id: Option<String>,
    pub ttl: Option<u64>,
}

/// The submission/worker/protocol-handler contract for backgrounded
/// invocations: the abstract "external durable queue" spec §1 calls for,
/// trimmed to the handful of operations a worker and the wire-facing
/// `tasks/*` handlers actually need. Assigns ids,
/// ensures at-least-once delivery to a worker, and honors cancellation.
/// `tasks.get`/`tasks.result`/`tasks.list`/`tasks.cancel` are served
/// directly from this trait — the core caches nothing of its own.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit work and return the assigned task id, with the task recorded
    /// as `Pending`.
    async fn submit(&self, task: QueuedTask) -> Result<String, TaskQueueError>;

    /// Pull the next pending task for a worker to execute, transitioning it
    /// to `Working`. Returns `None` when nothing is pending — callers poll.
    async fn poll(&self) -> Result<Option<Task>, TaskQueueError>;

    /// Look up a task by id.
    async fn get(&self, task_id: &str) -> Result<Option<Task>, TaskQueueError>;

    /// List all tasks, newest first.
    async fn list(&self) -> Result<Vec<Task>, TaskQueueError>;

    /// Request cancellation. Transitions a non-terminal task to
    /// `Cancelled`; the worker observes this at its next suspension point
    /// and stops without posting a result (spec §5).
    async fn cancel(&self, task_id: &str) -> Result<(), TaskQueueError>;

    /// Returns true if the task has been asked to cancel but has not yet
    /// reached a terminal state — the worker's cancellation check.
    async fn is_cancelled(&self, task_id: &str) -> Result<bool, TaskQueueError>;

    /// Store a successful result and mark the task `Completed`.
    async fn store_result(&self, task_id: &str, result: Value) -> Result<(), TaskQueueError>;

    /// Store a failure and mark the task `Failed`.
    async fn store_error(&self, task_id: &str, error: String) -> Result<(), TaskQueueError>;

    /// Fetch the stored outcome for a terminal task, reproducing exactly
    /// what the underlying request would have returned (spec §4.11).
    async fn result(&self, task_id: &str) -> Result<Option<Task>, TaskQueueError>;

    /// Expire tasks past their TTL, transitioning them out of the active
    /// set. Returns the ids expired.
    async fn expire(&self) -> Result<Vec<String>, TaskQueueError>;

    /// Mark all non-terminal tasks as `Failed` — recovery after an unclean
    /// restart left them orphaned mid-flight.
    async fn recover_stuck(&self) -> Result<Vec<String>, TaskQueueError>;
}

pub(crate) fn terminal_guard(state: TaskState, task_id: &str) -> Result<(), TaskQueueError> {
    if state.is_terminal() {
        Err(TaskQueueError::AlreadyTerminal(task_id.to_string()))
    } else {
        Ok(())
    }
}
