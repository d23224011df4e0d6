use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use mcp_protocol::task::{Task, TaskKindWire, TaskState};

use crate::queue::{terminal_guard, QueuedTask, TaskQueue, TaskQueueError};

struct Inner {
    tasks: Vec<Task>,
    pending: VecDeque<String>,
}

/// In-memory `TaskQueue`, for tests and for servers that don't need a
/// persisted queue across restarts: a single lock-protected table, one
/// pending-work queue for `poll`.
pub struct InMemoryTaskQueue {
    inner: Mutex<Inner>,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { tasks: Vec::new(), pending: VecDeque::new() }) }
    }

    fn find_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> Option<&'a mut Task> {
        tasks.iter_mut().find(|t| t.task_id == task_id)
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn submit(&self, task: QueuedTask) -> Result<String, TaskQueueError> {
        let task_id = Uuid::now_v7().to_string();
        let record = Task {
            task_id: task_id.clone(),
            kind: task.kind,
            target_key: task.target_key,
            arguments: task.arguments,
            state: TaskState::Pending,
            created_at: Utc::now().to_rfc3339(),
            ttl: task.ttl,
            result: None,
            error: None,
            session_id: task.session_id,
        };
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        inner.tasks.push(record);
        inner.pending.push_back(task_id.clone());
        Ok(task_id)
    }

    async fn poll(&self) -> Result<Option<Task>, TaskQueueError> {
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        while let Some(task_id) = inner.pending.pop_front() {
            let Some(task) = Self::find_mut(&mut inner.tasks, &task_id) else { continue };
            if task.state == TaskState::Cancelled {
                continue;
            }
            task.state = TaskState::Working;
            return Ok(Some(task.clone()));
        }
        Ok(None)
    }

    async fn get(&self, task_id: &str) -> Result<Option<Task>, TaskQueueError> {
        let inner = self.inner.lock().expect("task queue lock poisoned");
        Ok(inner.tasks.iter().find(|t| t.task_id == task_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Task>, TaskQueueError> {
        let inner = self.inner.lock().expect("task queue lock poisoned");
        let mut tasks = inner.tasks.clone();
        tasks.reverse();
        Ok(tasks)
    }

    async fn cancel(&self, task_id: &str) -> Result<(), TaskQueueError> {
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        let task = Self::find_mut(&mut inner.tasks, task_id)
            .ok_or_else(|| TaskQueueError::NotFound(task_id.to_string()))?;
        terminal_guard(task.state, task_id)?;
        task.state = TaskState::Cancelled;
        Ok(())
    }

    async fn is_cancelled(&self, task_id: &str) -> Result<bool, TaskQueueError> {
        let inner = self.inner.lock().expect("task queue lock poisoned");
        let task = inner
            .tasks
            .iter()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| TaskQueueError::NotFound(task_id.to_string()))?;
        Ok(task.state == TaskState::Cancelled)
    }

    async fn store_result(&self, task_id: &str, result: Value) -> Result<(), TaskQueueError> {
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        let task = Self::find_mut(&mut inner.tasks, task_id)
            .ok_or_else(|| TaskQueueError::NotFound(task_id.to_string()))?;
        if task.state == TaskState::Cancelled {
            // Worker finished after cancellation was observed elsewhere;
            // the cancelled state wins and no result is posted (spec §5).
            return Ok(());
        }
        task.result = Some(result);
        task.state = TaskState::Completed;
        Ok(())
    }

    async fn store_error(&self, task_id: &str, error: String) -> Result<(), TaskQueueError> {
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        let task = Self::find_mut(&mut inner.tasks, task_id)
            .ok_or_else(|| TaskQueueError::NotFound(task_id.to_string()))?;
        if task.state == TaskState::Cancelled {
            return Ok(());
        }
        task.error = Some(error);
        task.state = TaskState::Failed;
        Ok(())
    }

    async fn result(&self, task_id: &str) -> Result<Option<Task>, TaskQueueError> {
        self.get(task_id).await
    }

    async fn expire(&self) -> Result<Vec<String>, TaskQueueError> {
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        let now = Utc::now();
        let mut expired = Vec::new();
        for task in &mut inner.tasks {
            if task.state.is_terminal() {
                continue;
            }
            let Some(ttl) = task.ttl else { continue };
            let Ok(created) = chrono::DateTime::parse_from_rfc3339(&task.created_at) else { continue };
            let age = now.signed_duration_since(created).num_seconds().max(0) as u64;
            if age > ttl {
                task.state = TaskState::Failed;
                task.error = Some("task expired before completion".to_string());
                expired.push(task.task_id.clone());
            }
        }
        if !expired.is_empty() {
            warn!(count = expired.len(), "expired tasks past ttl");
        }
        Ok(expired)
    }

    async fn recover_stuck(&self) -> Result<Vec<String>, TaskQueueError> {
        let mut inner = self.inner.lock().expect("task queue lock poisoned");
        let mut recovered = Vec::new();
        for task in &mut inner.tasks {
            if !task.state.is_terminal() {
                task.state = TaskState::Failed;
                task.error = Some("task was in progress during an unclean shutdown".to_string());
                recovered.push(task.task_id.clone());
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task() -> QueuedTask {
        QueuedTask {
            kind: TaskKindWire::Tool,
            target_key: "tool:slow_job@".to_string(),
            arguments: json!({"n": 1}),
            session_id: Some("sess-1".to_string()),
            ttl: None,
        }
    }

    #[tokio::test]
    async fn submit_then_poll_transitions_to_working() {
        let queue = InMemoryTaskQueue::new();
        let task_id = queue.submit(sample_task()).await.unwrap();
        let polled = queue.poll().await.unwrap().unwrap();
        assert_eq!(polled.task_id, task_id);
        assert_eq!(polled.state, TaskState::Working);
    }

    #[tokio::test]
    async fn poll_with_nothing_pending_returns_none() {
        let queue = InMemoryTaskQueue::new();
        assert!(queue.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_result_marks_completed_and_result_round_trips() {
        let queue = InMemoryTaskQueue::new();
        let task_id = queue.submit(sample_task()).await.unwrap();
        queue.poll().await.unwrap();
        queue.store_result(&task_id, json!({"ok": true})).await.unwrap();
        let task = queue.result(&task_id).await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn cancel_prevents_late_result_from_overwriting_state() {
        let queue = InMemoryTaskQueue::new();
        let task_id = queue.submit(sample_task()).await.unwrap();
        queue.poll().await.unwrap();
        queue.cancel(&task_id).await.unwrap();
        queue.store_result(&task_id, json!({"ok": true})).await.unwrap();
        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Cancelled);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn cancelling_a_terminal_task_errors() {
        let queue = InMemoryTaskQueue::new();
        let task_id = queue.submit(sample_task()).await.unwrap();
        queue.poll().await.unwrap();
        queue.store_result(&task_id, json!(1)).await.unwrap();
        let err = queue.cancel(&task_id).await.unwrap_err();
        assert!(matches!(err, TaskQueueError::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn recover_stuck_fails_non_terminal_tasks() {
        let queue = InMemoryTaskQueue::new();
        let task_id = queue.submit(sample_task()).await.unwrap();
        let recovered = queue.recover_stuck().await.unwrap();
        assert_eq!(recovered, vec![task_id.clone()]);
        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Failed);
    }
}
