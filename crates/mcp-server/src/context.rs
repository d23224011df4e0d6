use std::sync::Arc;
use std::time::Duration;

use mcp_protocol::{McpError, McpResult};
use mcp_rpc::JsonRpcNotification;
use mcp_session_storage::{session_key, StateStore, DEFAULT_TTL};
use mcp_task_queue::TaskQueue;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::elicitation::{ElicitClient, ElicitOutcome};
use crate::sampling::{LocalToolExecutor, SampleClient, SampleMessage, SampleTool};

/// Per-request identity, set once by the dispatcher and read-only for the
/// lifetime of the request (spec §4.10's "Context object surface",
/// supplemented from `examples/original_source/.../context.py`).
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub request_id: String,
    pub session_id: String,
    pub client_id: Option<String>,
}

/// A channel the transport gave the dispatcher for pushing notifications
/// (progress, log messages) back to the client outside the request/response
/// cycle (spec §6).
pub type NotificationSink = Arc<dyn Fn(JsonRpcNotification) + Send + Sync>;

/// Services shared by every request against one server: the state store,
/// the task queue (if task support is enabled), and the sampling client.
/// `mcp-server::server::McpServer` owns one of these and clones it (cheaply
/// — everything inside is `Arc`) into every request's `Context`.
#[derive(Clone)]
pub struct ServerServices {
    pub state_store: Arc<dyn StateStore>,
    pub queue: Option<Arc<dyn TaskQueue>>,
    pub sampler: Option<Arc<dyn SampleClient>>,
    pub elicitor: Option<Arc<dyn ElicitClient>>,
    /// Lets `Context::read_resource` re-enter the provider chain the way a
    /// nested request would, instead of only being reachable from the wire
    /// layer. `None` in the handful of unit-test contexts that build a bare
    /// `Context` without assembling a full `McpServer`.
    pub dispatcher: Option<Arc<Dispatcher>>,
    pub notifications: NotificationSink,
}

/// The object injected into tool/resource/prompt callables as the `Context`
/// dependency (spec §4.9's dependency injection list; surface enumerated in
/// `SPEC_FULL.md`'s "Context object surface"). Cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub identity: RequestIdentity,
    services: ServerServices,
}

impl Context {
    pub fn new(identity: RequestIdentity, services: ServerServices) -> Self {
        Self { identity, services }
    }

    pub fn request_id(&self) -> &str {
        &self.identity.request_id
    }

    pub fn client_id(&self) -> Option<&str> {
        self.identity.client_id.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.identity.session_id
    }

    /// Structured logging back to the client as a `notifications/message`
    /// (spec: `context.py`'s `log(level, message, logger_name)`), as well as
    /// into the server's own tracing output so operators see it too.
    pub fn log(&self, level: &str, message: &str, logger_name: Option<&str>) {
        match level {
            "error" => error!(logger = logger_name, "{message}"),
            "warn" | "warning" => warn!(logger = logger_name, "{message}"),
            "debug" => debug!(logger = logger_name, "{message}"),
            _ => info!(logger = logger_name, "{message}"),
        }
        let notification =
            JsonRpcNotification::log(level, logger_name, Value::String(message.to_string()));
        (self.services.notifications)(notification);
    }

    /// Progress reporting for long-running tool calls (spec: `context.py`'s
    /// `report_progress`).
    pub fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) {
        let token = Value::String(self.identity.request_id.clone());
        let notification = JsonRpcNotification::progress(token, progress, total, message);
        (self.services.notifications)(notification);
    }

    /// Session-scoped state, delegating to the `StateStore` (spec §4.10).
    pub async fn get_state(&self, key: &str) -> McpResult<Option<Value>> {
        self.services
            .state_store
            .get(&session_key(&self.identity.session_id, key))
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))
    }

    pub async fn set_state(&self, key: &str, value: Value) -> McpResult<()> {
        self.set_state_with_ttl(key, value, DEFAULT_TTL).await
    }

    pub async fn set_state_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> McpResult<()> {
        self.services
            .state_store
            .put(&session_key(&self.identity.session_id, key), value, ttl)
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))
    }

    pub async fn remove_state(&self, key: &str) -> McpResult<()> {
        self.services
            .state_store
            .delete(&session_key(&self.identity.session_id, key))
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))
    }

    /// Whether a task queue is configured for this server — tools with
    /// `task_config.mode != forbidden` need this to be true (spec §4.11).
    pub fn has_task_queue(&self) -> bool {
        self.services.queue.is_some()
    }

    pub fn queue(&self) -> McpResult<&Arc<dyn TaskQueue>> {
        self.services
            .queue
            .as_ref()
            .ok_or_else(|| McpError::Protocol("no task queue configured on this server".to_string()))
    }

    pub fn sampler(&self) -> McpResult<&Arc<dyn SampleClient>> {
        self.services
            .sampler
            .as_ref()
            .ok_or_else(|| McpError::Protocol("no sampling client configured on this server".to_string()))
    }

    fn elicitor(&self) -> McpResult<&Arc<dyn ElicitClient>> {
        self.services
            .elicitor
            .as_ref()
            .ok_or_else(|| McpError::Protocol("no elicitation client configured on this server".to_string()))
    }

    /// Read a resource or resource template through the same provider chain
    /// and middleware a `resources/read` request goes through (spec:
    /// `context.py`'s `read_resource(uri)`), returning the wire-shaped
    /// `ResourceContent` as a raw `Value`.
    pub async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        let dispatcher = self
            .services
            .dispatcher
            .clone()
            .ok_or_else(|| McpError::Protocol("no dispatcher configured on this context".to_string()))?;
        dispatcher.read_resource(uri, self.clone()).await
    }

    /// Ask the host's LLM to complete a message, looping with local tool
    /// execution until a typed result is produced (spec §4.12, `context.py`'s
    /// `sample(...)`). Thin wrapper over the free-standing `sampling::sample`
    /// pipeline, resolving the client from this context's services.
    pub async fn sample(
        &self,
        history: Vec<SampleMessage>,
        tools: Vec<SampleTool>,
        result_schema: Option<Value>,
        executor: Option<LocalToolExecutor>,
    ) -> McpResult<Value> {
        let client = self.sampler()?.clone();
        crate::sampling::sample(client.as_ref(), history, tools, result_schema, executor).await
    }

    /// Ask the client's user for a small piece of missing information
    /// mid-call (spec: `context.py`'s `elicit(message, response_type)`).
    /// `requested_schema` is always an object schema; a caller wanting a
    /// bare primitive wraps it in `{value: <inner>}` first, the same
    /// convention `sample`'s `final_response` tool uses.
    pub async fn elicit(&self, message: &str, requested_schema: Value) -> McpResult<ElicitOutcome> {
        self.elicitor()?.elicit(message, requested_schema).await
    }
}

/// `CurrentServer` dependency-injection marker (spec §4.9): the identity of
/// the server handling this request, exposed read-only to tool callables.
#[derive(Clone)]
pub struct CurrentServer {
    pub name: String,
    pub version: String,
}

/// `CurrentWorker` dependency-injection marker (spec §4.11): only present
/// while executing inside a task worker, never during direct dispatch.
#[derive(Clone)]
pub struct CurrentWorker {
    pub task_id: String,
}

tokio::task_local! {
    static CURRENT_CONTEXT: Context;
    static CURRENT_SERVER_INFO: CurrentServer;
    static CURRENT_WORKER_INFO: Option<CurrentWorker>;
    static CURRENT_QUEUE_INFO: Option<Arc<dyn TaskQueue>>;
}

/// Run `fut` with the per-request task-locals set (spec §5: "a task-local
/// variable holds the current Context, current server, current queue, and
/// current worker... every request establishes these on entry and resets
/// them on exit, including on exceptions"). Using `tokio::task_local!`'s
/// `scope` gives us exactly that: the values are visible to everything
/// `fut` awaits, including nested requests it spawns as sibling tasks that
/// re-enter `with_request_scope` with their own frame, and they are
/// guaranteed to be torn down when `fut` completes or panics.
pub async fn with_request_scope<F, T>(
    context: Context,
    server: CurrentServer,
    worker: Option<CurrentWorker>,
    fut: F,
) -> T
where
    F: std::future::Future<Output = T>,
{
    let queue = context.services.queue.clone();
    CURRENT_CONTEXT
        .scope(
            context,
            CURRENT_SERVER_INFO.scope(
                server,
                CURRENT_WORKER_INFO.scope(worker, CURRENT_QUEUE_INFO.scope(queue, fut)),
            ),
        )
        .await
}

/// Read the current request's `Context` from any stack frame within the
/// active request (spec §4.8 step 1: "`get_context()` works from any stack
/// frame within this request"). Panics outside `with_request_scope` —
/// tool/resource/prompt callables always run inside one.
pub fn get_context() -> Context {
    CURRENT_CONTEXT.with(|ctx| ctx.clone())
}

pub fn current_server() -> CurrentServer {
    CURRENT_SERVER_INFO.with(|s| s.clone())
}

pub fn current_worker() -> Option<CurrentWorker> {
    CURRENT_WORKER_INFO.with(|w| w.clone())
}

/// `CurrentQueue` dependency-injection marker (spec §4.11): `None` when no
/// task queue is configured on this server.
pub fn current_queue() -> Option<Arc<dyn TaskQueue>> {
    CURRENT_QUEUE_INFO.try_with(|q| q.clone()).unwrap_or(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_session_storage::InMemoryStateStore;

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

    fn identity() -> RequestIdentity {
        RequestIdentity { request_id: "req-1".into(), session_id: "sess-1".into(), client_id: None }
    }

    #[tokio::test]
    async fn get_context_inside_scope_matches_the_one_entered() {
        let ctx = Context::new(identity(), services());
        let server = CurrentServer { name: "demo".into(), version: "1.0".into() };
        with_request_scope(ctx, server, None, async {
            assert_eq!(get_context().request_id(), "req-1");
            assert_eq!(current_server().name, "demo");
            assert!(current_worker().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn state_round_trips_through_context() {
        let ctx = Context::new(identity(), services());
        ctx.set_state("k", Value::String("v".into())).await.unwrap();
        assert_eq!(ctx.get_state("k").await.unwrap(), Some(Value::String("v".into())));
    }

    #[tokio::test]
    async fn worker_marker_only_present_inside_worker_scope() {
        let ctx = Context::new(identity(), services());
        let server = CurrentServer { name: "demo".into(), version: "1.0".into() };
        let worker = CurrentWorker { task_id: "task-1".into() };
        with_request_scope(ctx, server, Some(worker), async {
            assert_eq!(current_worker().unwrap().task_id, "task-1");
        })
        .await;
    }

    #[tokio::test]
    async fn read_resource_without_a_dispatcher_is_a_protocol_error() {
        let ctx = Context::new(identity(), services());
        let err = ctx.read_resource("users://42/profile").await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn read_resource_goes_through_the_provider_chain() {
        use crate::builder::ResourceBuilder;
        use crate::dispatch::{Dispatcher, Filters};
        use crate::middleware::MiddlewareChain;
        use crate::provider::{LocalProviderAdapter, Provider};
        use crate::registry::{DuplicatePolicy, LocalProvider};

        let resource = ResourceBuilder::new("config://app/name", "app_name").unwrap().text("demo-server");
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_resource(resource).unwrap();
        let provider: Arc<dyn Provider> =
            Arc::new(LocalProviderAdapter { registry: Arc::new(tokio::sync::RwLock::new(registry)) });
        let dispatcher = Arc::new(Dispatcher::new(vec![provider], MiddlewareChain::new(), Filters::default()));

        let mut svc = services();
        svc.dispatcher = Some(dispatcher);
        let ctx = Context::new(identity(), svc);

        let value = ctx.read_resource("config://app/name").await.unwrap();
        assert_eq!(value["content"][0]["text"], "demo-server");
    }

    #[tokio::test]
    async fn elicit_without_a_client_is_a_protocol_error() {
        let ctx = Context::new(identity(), services());
        let err = ctx.elicit("pick one", serde_json::json!({"type": "object"})).await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn elicit_delegates_to_the_configured_client() {
        use crate::elicitation::{ElicitAction, ElicitClient, ElicitOutcome};
        use async_trait::async_trait;

        struct DecliningClient;
        #[async_trait]
        impl ElicitClient for DecliningClient {
            async fn elicit(&self, _message: &str, _requested_schema: Value) -> McpResult<ElicitOutcome> {
                Ok(ElicitOutcome { action: ElicitAction::Decline, content: None })
            }
        }

        let mut svc = services();
        svc.elicitor = Some(Arc::new(DecliningClient));
        let ctx = Context::new(identity(), svc);

        let outcome = ctx.elicit("confirm?", serde_json::json!({"type": "object"})).await.unwrap();
        assert_eq!(outcome.action, ElicitAction::Decline);
    }
}
