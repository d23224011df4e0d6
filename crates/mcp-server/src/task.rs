//! Task submission and worker execution (spec §4.11, C11 submission/worker
//! half). `mcp-task-queue` owns the queue trait and storage; this module
//! wires it to the execution engine on both ends.

use std::sync::Arc;

use mcp_protocol::task::TaskKindWire;
use mcp_protocol::{Key, McpError, McpResult, Task, TaskState, VersionSpec};
use mcp_task_queue::{QueuedTask, TaskQueue};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::context::{with_request_scope, Context, CurrentServer, CurrentWorker, RequestIdentity, ServerServices};
use crate::execute::{self};
use crate::provider::Provider;

/// Per-request task metadata: present iff the caller asked to background
/// this call (spec §4.11 "TaskMeta").
#[derive(Debug, Clone, Default)]
pub struct TaskMeta {
    pub ttl: Option<u64>,
    pub caller_supplied_id: Option<String>,
}

impl TaskMeta {
    /// Parse the `_meta.task` object a request carries (spec §4.11;
    /// `mcp_rpc::JsonRpcRequest::task_meta` hands us this value unparsed).
    pub fn from_value(value: &Value) -> Self {
        Self {
            ttl: value.get("ttl").and_then(Value::as_u64),
            caller_supplied_id: value.get("id").and_then(Value::as_str).map(str::to_string),
        }
    }
}

/// The wire shape returned in place of a tool's normal result when the call
/// was backgrounded, or when a forbidden-mode tool degrades a task-requested
/// call to an already-completed one (spec §4.11).
#[derive(Debug, Clone, Serialize)]
pub struct TaskCreated {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub state: TaskState,
}

impl From<&Task> for TaskCreated {
    fn from(task: &Task) -> Self {
        Self { task_id: task.task_id.clone(), state: task.state }
    }
}

/// Submit a tool call to the queue instead of running it inline (spec
/// §4.11 "Submission path"). Called by the execution engine once
/// `execute::decide_task_path` returns `Background`.
pub async fn submit_tool_call(
    queue: &Arc<dyn TaskQueue>,
    tool_key: &str,
    args: Value,
    session_id: Option<String>,
    task_meta: &TaskMeta,
) -> McpResult<Task> {
    let queued = QueuedTask {
        kind: TaskKindWire::Tool,
        target_key: tool_key.to_string(),
        arguments: args,
        session_id,
        ttl: task_meta.ttl,
    };
    let task_id = queue.submit(queued).await.map_err(|e| McpError::Protocol(e.to_string()))?;
    queue
        .get(&task_id)
        .await
        .map_err(|e| McpError::Protocol(e.to_string()))?
        .ok_or_else(|| McpError::Protocol(format!("task '{task_id}' vanished immediately after submission")))
}

/// `mode = forbidden` degrades a backgrounded request to an immediately
/// `completed` task carrying the synchronous result (spec §4.11 "Graceful
/// degradation").
pub fn immediate_completion(tool_key: &str, args: Value, result: Value, task_meta: &TaskMeta) -> Task {
    Task {
        task_id: task_meta.caller_supplied_id.clone().unwrap_or_else(|| uuid::Uuid::now_v7().to_string()),
        kind: TaskKindWire::Tool,
        target_key: tool_key.to_string(),
        arguments: args,
        state: TaskState::Completed,
        created_at: chrono::Utc::now().to_rfc3339(),
        ttl: task_meta.ttl,
        result: Some(result),
        error: None,
        session_id: None,
    }
}

/// First-match provider lookup by a task's `target_key` (the tool's
/// canonical `Key`, pinning the exact version the submission side resolved),
/// ignoring session visibility filters — the submission-side dispatch
/// already applied those before handing work to the queue (spec §4.11:
/// "middleware has already run on the submission side").
async fn resolve_tool(providers: &[Arc<dyn Provider>], target_key: &str) -> Option<(Arc<dyn Provider>, mcp_protocol::Tool)> {
    let key = Key::parse(target_key)?;
    let version = (!key.version.is_empty()).then(|| VersionSpec::exact(key.version.clone()));
    for provider in providers {
        if let Some(tool) = provider.get_tool(&key.name, version.as_ref()).await {
            return Some((provider.clone(), tool));
        }
    }
    None
}

/// Poll the queue once and, if work is pending, run it (spec §4.11 "Worker
/// path"): resolve the target component, re-establish a request context
/// carrying `CurrentWorker`/`CurrentQueue`, re-run the execution engine for
/// the tool's function body, and store the outcome back into the queue.
/// Returns whether a task was picked up.
pub async fn run_worker_once(
    queue: Arc<dyn TaskQueue>,
    providers: &[Arc<dyn Provider>],
    services: ServerServices,
    server: CurrentServer,
) -> McpResult<bool> {
    let Some(task) = queue.poll().await.map_err(|e| McpError::Protocol(e.to_string()))? else {
        return Ok(false);
    };
    let task_id = task.task_id.clone();

    let Some((provider, tool)) = resolve_tool(providers, &task.target_key).await else {
        let _ = queue.store_error(&task_id, format!("unknown tool target '{}'", task.target_key)).await;
        error!(task_id, target = %task.target_key, "task worker could not resolve its target tool");
        return Ok(true);
    };

    let identity = RequestIdentity {
        request_id: task_id.clone(),
        session_id: task.session_id.clone().unwrap_or_default(),
        client_id: None,
    };
    let context = Context::new(identity, services);
    let worker = CurrentWorker { task_id: task_id.clone() };

    let outcome = with_request_scope(context.clone(), server, Some(worker), async {
        if queue.is_cancelled(&task_id).await.unwrap_or(false) {
            return None;
        }
        Some(execute::invoke_tool(&provider, &tool, None, task.arguments.clone(), context, false).await)
    })
    .await;

    match outcome {
        None => info!(task_id, "task was cancelled before the worker ran it"),
        Some(Ok(result)) => {
            let value = serde_json::to_value(result).map_err(McpError::from)?;
            let _ = queue.store_result(&task_id, value).await;
        }
        Some(Err(err)) => {
            let _ = queue.store_error(&task_id, err.to_string()).await;
        }
    }
    Ok(true)
}

// Re-exported for call sites that only need the branch decision, so
// `mcp_server::task` is a complete one-stop import for task-mode wiring.
pub use crate::execute::TaskDecision as BackgroundDecision;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServerServices;
    use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
    use crate::provider::LocalProviderAdapter;
    use crate::registry::{DuplicatePolicy, LocalProvider};
    use mcp_protocol::{ComponentMeta, Tool};
    use mcp_session_storage::InMemoryStateStore;
    use mcp_task_queue::InMemoryTaskQueue;

    fn services() -> ServerServices {
        ServerServices {
            state_store: Arc::new(InMemoryStateStore::new()),
            queue: None,
            sampler: None,
            elicitor: None,
            dispatcher: None,
            notifications: Arc::new(|_| {}),
        }
    }

    fn echo_tool() -> RegisteredTool {
        RegisteredTool {
            descriptor: Tool {
                meta: ComponentMeta::new("echo").unwrap(),
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
                output_schema: None,
                annotations: None,
                exclude_args: vec![],
                task_config: Default::default(),
            },
            handler: Box::new(|args, _ctx| -> BoxFuture<'static, McpResult<ToolOutput>> {
                Box::pin(async move { Ok(ToolOutput::structured(args)) })
            }),
        }
    }

    #[tokio::test]
    async fn worker_runs_submitted_task_and_stores_result() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_tool(echo_tool()).unwrap();
        let providers: Vec<Arc<dyn Provider>> =
            vec![Arc::new(LocalProviderAdapter { registry: Arc::new(tokio::sync::RwLock::new(registry)) })];

        let queue: Arc<dyn TaskQueue> = Arc::new(InMemoryTaskQueue::new());
        let task_meta = TaskMeta::default();
        let task = submit_tool_call(&queue, "tool:echo@", serde_json::json!({"n": 1}), Some("s1".into()), &task_meta)
            .await
            .unwrap();

        let server = CurrentServer { name: "test".into(), version: "0".into() };
        let picked_up = run_worker_once(queue.clone(), &providers, services(), server).await.unwrap();
        assert!(picked_up);

        let stored = queue.get(&task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.state, TaskState::Completed);
        assert!(stored.result.is_some());
    }

    #[tokio::test]
    async fn worker_with_nothing_pending_returns_false() {
        let providers: Vec<Arc<dyn Provider>> = Vec::new();
        let queue: Arc<dyn TaskQueue> = Arc::new(InMemoryTaskQueue::new());
        let server = CurrentServer { name: "test".into(), version: "0".into() };
        let picked_up = run_worker_once(queue, &providers, services(), server).await.unwrap();
        assert!(!picked_up);
    }

    #[tokio::test]
    async fn worker_reports_missing_target_as_task_error() {
        let providers: Vec<Arc<dyn Provider>> = Vec::new();
        let queue: Arc<dyn TaskQueue> = Arc::new(InMemoryTaskQueue::new());
        let task_meta = TaskMeta::default();
        let task =
            submit_tool_call(&queue, "tool:nonexistent@", serde_json::json!({}), None, &task_meta).await.unwrap();
        let server = CurrentServer { name: "test".into(), version: "0".into() };
        run_worker_once(queue.clone(), &providers, services(), server).await.unwrap();
        let stored = queue.get(&task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.state, TaskState::Failed);
    }

    #[test]
    fn immediate_completion_builds_a_completed_task() {
        let task_meta = TaskMeta::default();
        let task = immediate_completion("t", serde_json::json!({}), serde_json::json!({"ok": true}), &task_meta);
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.result, Some(serde_json::json!({"ok": true})));
    }
}
