//! The server (spec §5, C13): ties the registry, provider chain,
//! middleware, dispatcher, and task worker together, and owns the lifespan
//! ordering a running server enters and leaves by. Splits setup from a
//! running instance the way a consuming-`Self` builder naturally does:
//! `ServerBuilder` produces an immutable `McpServer`, plus a thin
//! `run`/request-handling surface.

use std::sync::Arc;

use mcp_protocol::{
    ExperimentalCapabilities, Implementation, ListChangedCapability, McpError, McpResult, ServerCapabilities,
    TaskMode, ToolResult, VersionSpec,
};
use mcp_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use mcp_session_storage::{InMemoryStateStore, StateStore};
use mcp_task_queue::TaskQueue;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::context::{
    with_request_scope, Context, CurrentServer, NotificationSink, RequestIdentity, ServerServices,
};
use crate::dispatch::{Dispatcher, Filters};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::provider::{LifespanGuard, LocalProviderAdapter, Provider};
use crate::registry::{DuplicatePolicy, LocalProvider};
use crate::sampling::SampleClient;
use crate::task::{self, TaskMeta};

/// A server-wide setup/teardown scope, entered once at server start and
/// released once at shutdown (spec §4.4's `LifespanGuard`, promoted to the
/// server level). The closure form lets a caller stash arbitrary state
/// (a DB pool, a background client) in the returned guard.
pub type UserLifespan = Box<dyn Fn() -> crate::handler::BoxFuture<'static, LifespanGuard> + Send + Sync>;

/// Builds an `McpServer`. Register every local component before calling
/// `duplicate_policy` has no effect after the first `add_*` call on the
/// underlying registry — set it first.
pub struct ServerBuilder {
    name: String,
    version: String,
    registry: LocalProvider,
    mounted: Vec<Arc<dyn Provider>>,
    middleware: MiddlewareChain,
    filters: Filters,
    state_store: Option<Arc<dyn StateStore>>,
    queue: Option<Arc<dyn TaskQueue>>,
    sampler: Option<Arc<dyn SampleClient>>,
    elicitor: Option<Arc<dyn crate::elicitation::ElicitClient>>,
    notifications: Option<NotificationSink>,
    mask_error_details: bool,
    strict_input_validation: bool,
    user_lifespan: Option<UserLifespan>,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry: LocalProvider::new(DuplicatePolicy::Warn),
            mounted: Vec::new(),
            middleware: MiddlewareChain::new(),
            filters: Filters::default(),
            state_store: None,
            queue: None,
            sampler: None,
            elicitor: None,
            notifications: None,
            mask_error_details: false,
            strict_input_validation: false,
            user_lifespan: None,
        }
    }

    /// Must be called before any `add_tool`/`add_resource`/... call — the
    /// registry is already constructed with the default policy otherwise.
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.registry = LocalProvider::new(policy);
        self
    }

    pub fn add_tool(mut self, tool: crate::handler::RegisteredTool) -> McpResult<Self> {
        self.registry.add_tool(tool)?;
        Ok(self)
    }

    pub fn add_resource(mut self, resource: crate::handler::RegisteredResource) -> McpResult<Self> {
        self.registry.add_resource(resource)?;
        Ok(self)
    }

    pub fn add_resource_template(mut self, template: crate::handler::RegisteredResourceTemplate) -> McpResult<Self> {
        self.registry.add_resource_template(template)?;
        Ok(self)
    }

    pub fn add_prompt(mut self, prompt: crate::handler::RegisteredPrompt) -> McpResult<Self> {
        self.registry.add_prompt(prompt)?;
        Ok(self)
    }

    /// Mount another provider behind the local registry (spec §4.4):
    /// `MountedProvider`, `TransformingProvider`, `OpenApiProvider`, or
    /// `ProxyProvider`, tried in the order they're mounted, after the local
    /// registry.
    pub fn mount(mut self, provider: Arc<dyn Provider>) -> Self {
        self.mounted.push(provider);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn tag_filter(mut self, filter: crate::transform::TagFilter) -> Self {
        self.filters.tags = filter;
        self
    }

    pub fn version_filter(mut self, filter: crate::transform::VersionFilter) -> Self {
        self.filters.version = filter;
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn task_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn sampler(mut self, sampler: Arc<dyn SampleClient>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn elicitor(mut self, elicitor: Arc<dyn crate::elicitation::ElicitClient>) -> Self {
        self.elicitor = Some(elicitor);
        self
    }

    pub fn notifications(mut self, sink: NotificationSink) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn mask_error_details(mut self, mask: bool) -> Self {
        self.mask_error_details = mask;
        self
    }

    pub fn strict_input_validation(mut self, strict: bool) -> Self {
        self.strict_input_validation = strict;
        self
    }

    pub fn user_lifespan(mut self, lifespan: UserLifespan) -> Self {
        self.user_lifespan = Some(lifespan);
        self
    }

    pub async fn build(self) -> McpServer {
        let local: Arc<dyn Provider> =
            Arc::new(LocalProviderAdapter { registry: Arc::new(tokio::sync::RwLock::new(self.registry)) });
        let mut providers = vec![local];
        providers.extend(self.mounted);

        let capabilities = derive_capabilities(&providers).await;

        let dispatcher = Arc::new(
            Dispatcher::new(providers.clone(), self.middleware, self.filters)
                .with_mask_error_details(self.mask_error_details)
                .with_strict_input_validation(self.strict_input_validation),
        );

        let services = ServerServices {
            state_store: self.state_store.unwrap_or_else(|| Arc::new(InMemoryStateStore::new())),
            queue: self.queue,
            sampler: self.sampler,
            elicitor: self.elicitor,
            dispatcher: Some(dispatcher.clone()),
            notifications: self.notifications.unwrap_or_else(|| Arc::new(|_| {})),
        };

        McpServer {
            implementation: Implementation { name: self.name, version: self.version },
            capabilities,
            providers,
            services,
            dispatcher,
            mask_error_details: self.mask_error_details,
            user_lifespan: self.user_lifespan,
        }
    }
}

/// Scans the registered tools across every provider to decide whether the
/// `experimental.task` capability should be advertised (spec §4.11: any
/// component with a non-forbidden task mode turns this on), and whether
/// each list-changed capability is populated at all.
async fn derive_capabilities(providers: &[Arc<dyn Provider>]) -> ServerCapabilities {
    let mut has_tools = false;
    let mut has_resources = false;
    let mut has_prompts = false;
    let mut has_task_tools = false;
    for provider in providers {
        let tools = provider.list_tools().await;
        has_tools |= !tools.is_empty();
        has_task_tools |= tools.iter().any(|t| t.task_config.mode != TaskMode::Forbidden);
        has_resources |=
            !provider.list_resources().await.is_empty() || !provider.list_resource_templates().await.is_empty();
        has_prompts |= !provider.list_prompts().await.is_empty();
    }

    ServerCapabilities {
        tools: has_tools.then(ListChangedCapability::default),
        resources: has_resources.then(ListChangedCapability::default),
        prompts: has_prompts.then(ListChangedCapability::default),
        logging: None,
        experimental: has_task_tools.then(|| ExperimentalCapabilities { task: true }),
    }
}

/// A fully assembled, immutable server. Call `start()` to enter lifespans
/// and begin accepting requests through `handle_request`.
pub struct McpServer {
    pub implementation: Implementation,
    pub capabilities: ServerCapabilities,
    providers: Vec<Arc<dyn Provider>>,
    services: ServerServices,
    dispatcher: Arc<Dispatcher>,
    mask_error_details: bool,
    user_lifespan: Option<UserLifespan>,
}

impl McpServer {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(name, version)
    }

    /// Enter every lifespan in acquisition order (spec §5: "enter the user
    /// lifespan, then each provider's lifespan in order; then enter the
    /// queue/worker scope"), spawning the background task worker loop if a
    /// queue is configured. Returns a handle whose `shutdown` reverses the
    /// whole sequence.
    pub async fn start(self) -> RunningServer {
        let user_guard = match &self.user_lifespan {
            Some(lifespan) => Some(lifespan().await),
            None => None,
        };

        let mut provider_guards = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            provider_guards.push(provider.lifespan().await);
        }

        let worker_handle = self.services.queue.clone().map(|queue| {
            let providers = self.providers.clone();
            let services = self.services.clone();
            let server_info =
                CurrentServer { name: self.implementation.name.clone(), version: self.implementation.version.clone() };
            spawn_worker_loop(queue, providers, services, server_info)
        });

        info!(name = %self.implementation.name, version = %self.implementation.version, "server started");
        RunningServer { server: self, user_guard, provider_guards, worker_handle }
    }

    /// Dispatch one decoded JSON-RPC request, translating the core's error
    /// taxonomy to a wire response (spec §6, §7). `session_id`/`client_id`
    /// are supplied by the transport, which owns header parsing and session
    /// derivation (`mcp_session_storage::derive_session_id`, spec §4.10).
    #[tracing::instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        session_id: String,
        client_id: Option<String>,
    ) -> JsonRpcResponse {
        let identity = RequestIdentity { request_id: request.id.to_string(), session_id, client_id };
        let context = Context::new(identity, self.services.clone());
        let server_info =
            CurrentServer { name: self.implementation.name.clone(), version: self.implementation.version.clone() };

        let id = request.id.clone();
        let outcome = with_request_scope(context.clone(), server_info, None, self.route(request, context)).await;

        match outcome {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                warn!(error = %err, "request failed");
                JsonRpcResponse::error(id, JsonRpcError::from_mcp_error(&err, self.mask_error_details))
            }
        }
    }

    async fn route(&self, request: JsonRpcRequest, context: Context) -> McpResult<Value> {
        let version = request.version_spec_hint().map(VersionSpec::exact);
        let params = request.params.as_ref().map(mcp_rpc::RequestParams::to_value).unwrap_or(Value::Null);

        match request.method.as_str() {
            "tools/list" => {
                let tools = self.dispatcher.list_tools(&context).await;
                Ok(serde_json::json!({ "tools": tools.iter().map(tool_wire).collect::<Vec<_>>() }))
            }
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).ok_or_else(|| {
                    McpError::ValidationError("'name' is required".to_string())
                })?;
                let args = params.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));
                let task_meta = request.task_meta().map(TaskMeta::from_value);
                // A failed tool call is still a successful JSON-RPC response
                // (spec §4.9): the failure rides inside the result as
                // `{content, isError: true}`, never as a protocol error.
                // `resources/read` and `prompts/get` keep propagating `Err`
                // instead, for parity with the rest of the MCP spec.
                match self.dispatcher.call_tool(name, version.as_ref(), args, context, task_meta).await {
                    Ok(value) => Ok(value),
                    Err(err) => {
                        let message = err.user_message(self.mask_error_details);
                        serde_json::to_value(ToolResult::error(message)).map_err(McpError::from)
                    }
                }
            }
            "resources/list" => {
                let resources = self.dispatcher.list_resources(&context).await;
                Ok(serde_json::json!({ "resources": resources.iter().map(resource_wire).collect::<Vec<_>>() }))
            }
            "resources/templates/list" => {
                let templates = self.dispatcher.list_resource_templates(&context).await;
                Ok(serde_json::json!({ "resourceTemplates": templates.iter().map(template_wire).collect::<Vec<_>>() }))
            }
            "resources/read" => {
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::ValidationError("'uri' is required".to_string()))?;
                self.dispatcher.read_resource(uri, context).await
            }
            "prompts/list" => {
                let prompts = self.dispatcher.list_prompts(&context).await;
                Ok(serde_json::json!({ "prompts": prompts.iter().map(prompt_wire).collect::<Vec<_>>() }))
            }
            "prompts/get" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::ValidationError("'name' is required".to_string()))?;
                let args = params.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));
                let messages = self.dispatcher.get_prompt(name, version.as_ref(), args, context).await?;
                Ok(serde_json::json!({ "messages": messages }))
            }
            "initialize" => Ok(serde_json::json!({
                "protocolVersion": crate::PROTOCOL_VERSION,
                "serverInfo": self.implementation,
                "capabilities": self.capabilities,
            })),
            "tasks/get" => {
                let task = self.require_task(&params).await?;
                Ok(task_wire(&task))
            }
            "tasks/result" => {
                let task = self.require_task(&params).await?;
                match task.state {
                    mcp_protocol::TaskState::Completed => Ok(task.result.unwrap_or(Value::Null)),
                    mcp_protocol::TaskState::Failed => Err(McpError::TaskError {
                        task_id: task.task_id,
                        message: task.error.unwrap_or_else(|| "task failed".to_string()),
                    }),
                    other => Err(McpError::TaskError {
                        task_id: task.task_id,
                        message: format!("no result available (state: {other:?})"),
                    }),
                }
            }
            "tasks/list" => {
                let queue = self.task_queue()?;
                let tasks = queue.list().await.map_err(|e| McpError::Protocol(e.to_string()))?;
                Ok(serde_json::json!({ "tasks": tasks.iter().map(task_wire).collect::<Vec<_>>() }))
            }
            "tasks/cancel" => {
                let task_id = params
                    .get("taskId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::ValidationError("'taskId' is required".to_string()))?;
                let queue = self.task_queue()?;
                queue.cancel(task_id).await.map_err(|e| McpError::TaskError { task_id: task_id.to_string(), message: e.to_string() })?;
                let task = self.require_task(&params).await?;
                Ok(task_wire(&task))
            }
            "logging/setLevel" => Ok(serde_json::json!({})),
            other => Err(McpError::Protocol(format!("unknown method: {other}"))),
        }
    }

    fn task_queue(&self) -> McpResult<&Arc<dyn TaskQueue>> {
        self.services.queue.as_ref().ok_or_else(|| McpError::Protocol("no task queue configured".to_string()))
    }

    async fn require_task(&self, params: &Value) -> McpResult<mcp_protocol::Task> {
        let task_id = params
            .get("taskId")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::ValidationError("'taskId' is required".to_string()))?;
        let queue = self.task_queue()?;
        queue
            .get(task_id)
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?
            .ok_or_else(|| McpError::not_found("task", task_id))
    }
}

fn tool_wire(tool: &mcp_protocol::Tool) -> Value {
    serde_json::json!({
        "name": tool.meta.name,
        "title": tool.meta.title,
        "description": tool.meta.description,
        "inputSchema": tool.input_schema,
        "outputSchema": tool.output_schema,
    })
}

fn resource_wire(resource: &mcp_protocol::Resource) -> Value {
    serde_json::json!({
        "uri": resource.uri,
        "name": resource.meta.name,
        "title": resource.meta.title,
        "description": resource.meta.description,
        "mimeType": resource.mime_type,
    })
}

fn template_wire(template: &mcp_protocol::ResourceTemplate) -> Value {
    serde_json::json!({
        "uriTemplate": template.uri_template,
        "name": template.meta.name,
        "title": template.meta.title,
        "description": template.meta.description,
        "mimeType": template.mime_type,
    })
}

fn prompt_wire(prompt: &mcp_protocol::Prompt) -> Value {
    serde_json::json!({
        "name": prompt.meta.name,
        "title": prompt.meta.title,
        "description": prompt.meta.description,
        "arguments": prompt.arguments.iter().map(|a| serde_json::json!({
            "name": a.name,
            "description": a.description,
            "required": a.required,
        })).collect::<Vec<_>>(),
    })
}

fn task_wire(task: &mcp_protocol::Task) -> Value {
    serde_json::json!({
        "taskId": task.task_id,
        "state": task.state,
        "createdAt": task.created_at,
        "ttl": task.ttl,
    })
}

/// Polls the queue in a tight loop, backing off briefly when nothing is
/// pending (spec §4.11 "Worker path"). One task per server; stopped by
/// aborting the handle on shutdown.
fn spawn_worker_loop(
    queue: Arc<dyn TaskQueue>,
    providers: Vec<Arc<dyn Provider>>,
    services: ServerServices,
    server_info: CurrentServer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match task::run_worker_once(queue.clone(), &providers, services.clone(), server_info.clone()).await {
                Ok(true) => continue,
                Ok(false) => tokio::time::sleep(std::time::Duration::from_millis(50)).await,
                Err(err) => {
                    error!(error = %err, "task worker iteration failed");
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                }
            }
        }
    })
}

/// A started server. Dropping this without calling `shutdown` leaves
/// lifespans unreleased and the worker loop running — always shut down
/// explicitly.
pub struct RunningServer {
    server: McpServer,
    user_guard: Option<LifespanGuard>,
    provider_guards: Vec<LifespanGuard>,
    worker_handle: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn handle_request(
        &self,
        request: JsonRpcRequest,
        session_id: String,
        client_id: Option<String>,
    ) -> impl std::future::Future<Output = JsonRpcResponse> + '_ {
        self.server.handle_request(request, session_id, client_id)
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    /// Release every lifespan in reverse acquisition order (spec §5: "On
    /// shutdown: reverse"): stop the worker loop first, then provider
    /// lifespans from last-entered to first, then the user lifespan.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.worker_handle.take() {
            handle.abort();
        }
        while let Some(guard) = self.provider_guards.pop() {
            drop(guard);
        }
        drop(self.user_guard.take());
        info!(name = %self.server.implementation.name, "server shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
    use mcp_protocol::{ComponentMeta, Tool};
    use mcp_rpc::{RequestId, RequestParams};

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

    fn request(method: &str, params: serde_json::Map<String, Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(RequestId::Number(1), method, Some(RequestParams::Object(params.into_iter().collect())))
    }

    #[tokio::test]
    async fn call_tool_round_trips_through_handle_request() {
        let server = McpServer::builder("test-server", "0.1.0").add_tool(echo_tool()).unwrap().build().await;
        let running = server.start().await;

        let mut params = serde_json::Map::new();
        params.insert("name".to_string(), Value::String("echo".to_string()));
        params.insert("arguments".to_string(), serde_json::json!({"n": 1}));

        let response = running.handle_request(request("tools/call", params), "s1".to_string(), None).await;
        match response.outcome {
            mcp_rpc::JsonRpcOutcome::Result { result } => {
                assert_eq!(result["structuredContent"], serde_json::json!({"n": 1}));
            }
            mcp_rpc::JsonRpcOutcome::Error { error } => panic!("unexpected error: {error:?}"),
        }
        running.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_tool_surfaces_as_an_is_error_result_not_a_protocol_error() {
        let server = McpServer::builder("test-server", "0.1.0").build().await;
        let running = server.start().await;

        let mut params = serde_json::Map::new();
        params.insert("name".to_string(), Value::String("missing".to_string()));

        let response = running.handle_request(request("tools/call", params), "s1".to_string(), None).await;
        match response.outcome {
            mcp_rpc::JsonRpcOutcome::Result { result } => {
                assert_eq!(result["isError"], Value::Bool(true));
                assert!(result["content"][0]["text"].as_str().unwrap().contains("missing"));
            }
            mcp_rpc::JsonRpcOutcome::Error { error } => panic!("expected a success result, got error: {error:?}"),
        }
        running.shutdown().await;
    }

    #[tokio::test]
    async fn initialize_reports_task_capability_when_a_tool_is_backgroundable() {
        use mcp_protocol::{TaskConfig, TaskMode};
        let mut tool = echo_tool();
        tool.descriptor.task_config = TaskConfig { mode: TaskMode::Optional, ttl: None };
        let server = McpServer::builder("test-server", "0.1.0").add_tool(tool).unwrap().build().await;
        assert!(server.capabilities.experimental.as_ref().unwrap().task);
    }

    #[tokio::test]
    async fn list_tools_reports_registered_tools() {
        let server = McpServer::builder("test-server", "0.1.0").add_tool(echo_tool()).unwrap().build().await;
        let running = server.start().await;
        let response = running.handle_request(request("tools/list", Default::default()), "s1".to_string(), None).await;
        match response.outcome {
            mcp_rpc::JsonRpcOutcome::Result { result } => {
                assert_eq!(result["tools"].as_array().unwrap().len(), 1);
            }
            mcp_rpc::JsonRpcOutcome::Error { error } => panic!("unexpected error: {error:?}"),
        }
        running.shutdown().await;
    }
}
