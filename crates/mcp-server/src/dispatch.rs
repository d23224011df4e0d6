//! The dispatcher (spec §4.8, C8): per-request provider traversal, filter
//! application, and translation from the core's error taxonomy to wire
//! errors. Everything here runs inside `context::with_request_scope`, set up
//! by the caller (`mcp-server::server::McpServer`) before entering.

use std::collections::HashSet;
use std::sync::Arc;

use mcp_protocol::{
    ComponentMeta, McpError, McpResult, Prompt, PromptMessage, Resource, ResourceTemplate, Tool,
    VersionSpec,
};
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::execute::{self, TaskDecision};
use crate::middleware::{MiddlewareChain, MiddlewareContext, NextFn, RequestKind};
use crate::provider::Provider;
use crate::task::{self, TaskCreated, TaskMeta};
use crate::transform::{EnabledMark, TagFilter, VersionFilter};

/// The filters applied to every list/get: the server-wide tag and version
/// filters plus whatever enabled marks the current session has accumulated
/// (spec §4.6, applied at §4.8 steps 3-5).
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub tags: TagFilter,
    pub version: VersionFilter,
}

impl Filters {
    fn passes(&self, meta: &ComponentMeta, session_marks: &[EnabledMark]) -> bool {
        if !self.tags.passes(&meta.tags) {
            return false;
        }
        if !self.version.passes(meta.version_str()) {
            return false;
        }
        let mut enabled = meta.enabled;
        for mark in session_marks {
            let tag_matches = mark.tag.as_ref().map(|t| meta.tags.contains(t)).unwrap_or(true);
            let name_matches = mark.name.as_ref().map(|n| n == &meta.name).unwrap_or(true);
            if tag_matches && name_matches {
                enabled = mark.enabled;
            }
        }
        enabled
    }
}

/// The well-known state key session visibility rules are persisted under
/// (spec §4.6: "Session visibility rules are persisted per session... and
/// applied as Enabled marks on every list/get in that session").
const SESSION_MARKS_KEY: &str = "__mcp_enabled_marks__";

async fn session_marks(context: &Context) -> Vec<EnabledMark> {
    match context.get_state(SESSION_MARKS_KEY).await {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Owns the provider chain and server-wide filters; the piece `McpServer`
/// hands each incoming request to after establishing task-local context.
pub struct Dispatcher {
    providers: Vec<Arc<dyn Provider>>,
    middleware: MiddlewareChain,
    filters: Filters,
    mask_error_details: bool,
    strict_input_validation: bool,
}

impl Dispatcher {
    pub fn new(providers: Vec<Arc<dyn Provider>>, middleware: MiddlewareChain, filters: Filters) -> Self {
        Self { providers, middleware, filters, mask_error_details: false, strict_input_validation: false }
    }

    pub fn with_mask_error_details(mut self, mask: bool) -> Self {
        self.mask_error_details = mask;
        self
    }

    pub fn with_strict_input_validation(mut self, strict: bool) -> Self {
        self.strict_input_validation = strict;
        self
    }

    pub fn mask_error_details(&self) -> bool {
        self.mask_error_details
    }

    /// `task_meta` is `Some` when the caller attached `_meta.task` to the
    /// request (spec §4.11) — presence, not its contents, is what signals a
    /// backgrounded call.
    #[tracing::instrument(skip(self, args, context))]
    pub async fn call_tool(
        &self,
        name: &str,
        version: Option<&VersionSpec>,
        args: Value,
        context: Context,
        task_meta: Option<TaskMeta>,
    ) -> McpResult<Value> {
        let marks = session_marks(&context).await;
        let name = name.to_string();
        let version = version.cloned();
        let mc = MiddlewareContext { kind: RequestKind::CallTool, target: Some(name.clone()), params: args };

        let providers = self.providers.clone();
        let filters = self.filters.clone();
        let strict = self.strict_input_validation;
        let inner_context = context.clone();
        let task_requested = task_meta.is_some();

        let innermost: NextFn = Box::new(move |mc: MiddlewareContext| {
            Box::pin(async move {
                let args = mc.params;
                for provider in &providers {
                    if let Some(tool) = provider.get_tool(&name, version.as_ref()).await {
                        if filters.passes(&tool.meta, &marks) {
                            let decision = execute::decide_task_path(&tool, task_requested)?;
                            let tm = task_meta.clone().unwrap_or_default();

                            if decision == TaskDecision::Background {
                                let queue = inner_context.queue()?.clone();
                                let created = task::submit_tool_call(
                                    &queue,
                                    &tool.key().to_string(),
                                    args,
                                    Some(inner_context.session_id().to_string()),
                                    &tm,
                                )
                                .await?;
                                return serde_json::to_value(TaskCreated::from(&created)).map_err(McpError::from);
                            }

                            let result = execute::invoke_tool(
                                provider,
                                &tool,
                                version.as_ref(),
                                args,
                                inner_context.clone(),
                                strict,
                            )
                            .await?;

                            if task_requested {
                                let value = serde_json::to_value(&result).map_err(McpError::from)?;
                                let completed = task::immediate_completion(&tool.key().to_string(), Value::Null, value, &tm);
                                return serde_json::to_value(TaskCreated::from(&completed)).map_err(McpError::from);
                            }
                            return serde_json::to_value(result).map_err(McpError::from);
                        }
                        debug!(tool = %name, provider = provider.name(), "tool matched but filtered out");
                    }
                }
                Err(McpError::not_found("tool", name))
            })
        });

        self.middleware.run(mc, context, innermost).await
    }

    #[tracing::instrument(skip(self, context))]
    pub async fn read_resource(&self, uri: &str, context: Context) -> McpResult<Value> {
        let marks = session_marks(&context).await;
        let uri = uri.to_string();
        let mc = MiddlewareContext { kind: RequestKind::ReadResource, target: Some(uri.clone()), params: Value::Null };

        let providers = self.providers.clone();
        let filters = self.filters.clone();
        let inner_context = context.clone();

        let innermost: NextFn = Box::new(move |_mc: MiddlewareContext| {
            Box::pin(async move {
                // Concrete resources are tried before templates (spec §4.8 step 4).
                for provider in &providers {
                    if let Some(resource) = provider.get_resource(&uri).await {
                        if filters.passes(&resource.meta, &marks) {
                            let content =
                                execute::read_resource(provider, &uri, resource.mime_type.clone(), inner_context.clone(), false)
                                    .await?;
                            return serde_json::to_value(content).map_err(McpError::from);
                        }
                    }
                }
                for provider in &providers {
                    if let Some(template) = provider.get_resource_template(&uri).await {
                        if filters.passes(&template.meta, &marks) {
                            let content =
                                execute::read_resource(provider, &uri, template.mime_type.clone(), inner_context.clone(), true)
                                    .await?;
                            return serde_json::to_value(content).map_err(McpError::from);
                        }
                    }
                }
                Err(McpError::not_found("resource", uri))
            })
        });

        self.middleware.run(mc, context, innermost).await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        version: Option<&VersionSpec>,
        args: Value,
        context: Context,
    ) -> McpResult<Vec<PromptMessage>> {
        let marks = session_marks(&context).await;
        for provider in &self.providers {
            if let Some(prompt) = provider.get_prompt(name, version).await {
                if self.filters.passes(&prompt.meta, &marks) {
                    return provider.render_prompt(name, version, args, context).await;
                }
            }
        }
        Err(McpError::not_found("prompt", name))
    }

    /// Accumulate across providers with first-in-wins on duplicate
    /// identifiers, then drop anything the filters hide (spec §4.8 step 5).
    pub async fn list_tools(&self, context: &Context) -> Vec<Tool> {
        let marks = session_marks(context).await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for tool in provider.list_tools().await {
                if seen.insert(tool.key()) && self.filters.passes(&tool.meta, &marks) {
                    out.push(tool);
                }
            }
        }
        out
    }

    pub async fn list_resources(&self, context: &Context) -> Vec<Resource> {
        let marks = session_marks(context).await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for resource in provider.list_resources().await {
                if seen.insert(resource.uri.clone()) && self.filters.passes(&resource.meta, &marks) {
                    out.push(resource);
                }
            }
        }
        out
    }

    pub async fn list_resource_templates(&self, context: &Context) -> Vec<ResourceTemplate> {
        let marks = session_marks(context).await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for template in provider.list_resource_templates().await {
                if seen.insert(template.uri_template.clone()) && self.filters.passes(&template.meta, &marks) {
                    out.push(template);
                }
            }
        }
        out
    }

    pub async fn list_prompts(&self, context: &Context) -> Vec<Prompt> {
        let marks = session_marks(context).await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for prompt in provider.list_prompts().await {
                if seen.insert(prompt.key()) && self.filters.passes(&prompt.meta, &marks) {
                    out.push(prompt);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LocalProviderAdapter;
    use crate::registry::{DuplicatePolicy, LocalProvider};
    use mcp_session_storage::InMemoryStateStore;

    fn context() -> Context {
        Context::new(
            crate::context::RequestIdentity { request_id: "r1".into(), session_id: "s1".into(), client_id: None },
            crate::context::ServerServices {
                state_store: Arc::new(InMemoryStateStore::new()),
                queue: None,
                sampler: None,
                elicitor: None,
                dispatcher: None,
                notifications: Arc::new(|_| {}),
            },
        )
    }

    fn dispatcher_with(registry: LocalProvider) -> Dispatcher {
        let adapter: Arc<dyn Provider> =
            Arc::new(LocalProviderAdapter { registry: Arc::new(tokio::sync::RwLock::new(registry)) });
        Dispatcher::new(vec![adapter], MiddlewareChain::new(), Filters::default())
    }

    #[tokio::test]
    async fn unknown_tool_surfaces_not_found() {
        let dispatcher = dispatcher_with(LocalProvider::new(DuplicatePolicy::Warn));
        let err = dispatcher.call_tool("missing", None, serde_json::json!({}), context(), None).await.unwrap_err();
        assert!(matches!(err, McpError::NotFound { .. }));
    }

    #[tokio::test]
    async fn disabled_component_surfaces_as_not_found_not_disabled() {
        use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
        use mcp_protocol::Tool;
        let mut meta = ComponentMeta::new("hidden").unwrap();
        meta.enabled = false;
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry
            .add_tool(RegisteredTool {
                descriptor: Tool {
                    meta,
                    input_schema: serde_json::json!({"type": "object", "properties": {}}),
                    output_schema: None,
                    annotations: None,
                    exclude_args: vec![],
                    task_config: Default::default(),
                },
                handler: Box::new(|_a, _c| -> BoxFuture<'static, McpResult<ToolOutput>> {
                    Box::pin(async { Ok(ToolOutput::text("x")) })
                }),
            })
            .unwrap();
        let dispatcher = dispatcher_with(registry);
        let err = dispatcher.call_tool("hidden", None, serde_json::json!({}), context(), None).await.unwrap_err();
        assert!(matches!(err, McpError::NotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_tool_across_providers_lists_once() {
        use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
        use mcp_protocol::Tool;
        fn tool() -> RegisteredTool {
            RegisteredTool {
                descriptor: Tool {
                    meta: ComponentMeta::new("add").unwrap(),
                    input_schema: serde_json::json!({"type": "object", "properties": {}}),
                    output_schema: None,
                    annotations: None,
                    exclude_args: vec![],
                    task_config: Default::default(),
                },
                handler: Box::new(|_a, _c| -> BoxFuture<'static, McpResult<ToolOutput>> {
                    Box::pin(async { Ok(ToolOutput::text("x")) })
                }),
            }
        }
        let mut first = LocalProvider::new(DuplicatePolicy::Warn);
        first.add_tool(tool()).unwrap();
        let mut second = LocalProvider::new(DuplicatePolicy::Warn);
        second.add_tool(tool()).unwrap();
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(LocalProviderAdapter { registry: Arc::new(tokio::sync::RwLock::new(first)) }),
            Arc::new(LocalProviderAdapter { registry: Arc::new(tokio::sync::RwLock::new(second)) }),
        ];
        let dispatcher = Dispatcher::new(providers, MiddlewareChain::new(), Filters::default());
        assert_eq!(dispatcher.list_tools(&context()).await.len(), 1);
    }

    #[tokio::test]
    async fn distinct_versions_of_the_same_name_both_survive_listing() {
        use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
        use mcp_protocol::Tool;
        fn versioned_tool(version: &str) -> RegisteredTool {
            RegisteredTool {
                descriptor: Tool {
                    meta: ComponentMeta::new("calc").unwrap().with_version(version).unwrap(),
                    input_schema: serde_json::json!({"type": "object", "properties": {}}),
                    output_schema: None,
                    annotations: None,
                    exclude_args: vec![],
                    task_config: Default::default(),
                },
                handler: Box::new(|_a, _c| -> BoxFuture<'static, McpResult<ToolOutput>> {
                    Box::pin(async { Ok(ToolOutput::text("x")) })
                }),
            }
        }
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_tool(versioned_tool("1.0")).unwrap();
        registry.add_tool(versioned_tool("2.0")).unwrap();
        let dispatcher = dispatcher_with(registry);
        let tools = dispatcher.list_tools(&context()).await;
        assert_eq!(tools.len(), 2);
    }

    fn context_with_queue(queue: Arc<dyn mcp_task_queue::TaskQueue>) -> Context {
        Context::new(
            crate::context::RequestIdentity { request_id: "r1".into(), session_id: "s1".into(), client_id: None },
            crate::context::ServerServices {
                state_store: Arc::new(InMemoryStateStore::new()),
                queue: Some(queue),
                sampler: None,
                elicitor: None,
                dispatcher: None,
                notifications: Arc::new(|_| {}),
            },
        )
    }

    fn optional_task_tool(name: &str) -> crate::handler::RegisteredTool {
        use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
        use mcp_protocol::{TaskConfig, TaskMode, Tool};
        RegisteredTool {
            descriptor: Tool {
                meta: ComponentMeta::new(name).unwrap(),
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
                output_schema: None,
                annotations: None,
                exclude_args: vec![],
                task_config: TaskConfig { mode: TaskMode::Optional, ttl: None },
            },
            handler: Box::new(|_a, _c| -> BoxFuture<'static, McpResult<ToolOutput>> {
                Box::pin(async { Ok(ToolOutput::text("x")) })
            }),
        }
    }

    #[tokio::test]
    async fn backgrounded_optional_tool_returns_a_task_wrapper() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_tool(optional_task_tool("slow")).unwrap();
        let dispatcher = dispatcher_with(registry);
        let queue: Arc<dyn mcp_task_queue::TaskQueue> = Arc::new(mcp_task_queue::InMemoryTaskQueue::new());
        let result = dispatcher
            .call_tool(
                "slow",
                None,
                serde_json::json!({}),
                context_with_queue(queue),
                Some(TaskMeta::default()),
            )
            .await
            .unwrap();
        assert!(result.get("taskId").is_some());
        assert_eq!(result["state"], serde_json::json!("pending"));
    }

    #[tokio::test]
    async fn forbidden_tool_requested_as_task_degrades_to_completed_wrapper() {
        use crate::handler::{BoxFuture, RegisteredTool, ToolOutput};
        use mcp_protocol::Tool;
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry
            .add_tool(RegisteredTool {
                descriptor: Tool {
                    meta: ComponentMeta::new("sync_only").unwrap(),
                    input_schema: serde_json::json!({"type": "object", "properties": {}}),
                    output_schema: None,
                    annotations: None,
                    exclude_args: vec![],
                    task_config: Default::default(),
                },
                handler: Box::new(|_a, _c| -> BoxFuture<'static, McpResult<ToolOutput>> {
                    Box::pin(async { Ok(ToolOutput::text("done")) })
                }),
            })
            .unwrap();
        let dispatcher = dispatcher_with(registry);
        let queue: Arc<dyn mcp_task_queue::TaskQueue> = Arc::new(mcp_task_queue::InMemoryTaskQueue::new());
        let result = dispatcher
            .call_tool(
                "sync_only",
                None,
                serde_json::json!({}),
                context_with_queue(queue),
                Some(TaskMeta::default()),
            )
            .await
            .unwrap();
        assert_eq!(result["state"], serde_json::json!("completed"));
    }
}
