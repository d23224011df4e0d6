//! Providers (spec §4.4, C5): the uniform interface every component source
//! presents to the dispatcher, and the concrete sources built on top of it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::{Key, McpError, McpResult, Prompt, PromptMessage, Resource, ResourceTemplate, Tool, VersionSpec};
use serde_json::Value;

use crate::context::Context;
use crate::handler::{ResourceOutput, ToolOutput};
use crate::registry::LocalProvider;

/// An RAII-style scope entered at server start and released in reverse
/// order at shutdown (spec §4.4: "a scoped acquisition yielding a value").
/// Dropping the guard releases the resource; providers with nothing to set
/// up return `LifespanGuard::noop()`.
pub struct LifespanGuard(#[allow(dead_code)] Option<Box<dyn std::any::Any + Send>>);

impl LifespanGuard {
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn holding<T: Send + 'static>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }
}

/// The eight list/get operations every component source exposes (spec
/// §4.4), plus `lifespan`.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Vec<Tool>;
    async fn get_tool(&self, name: &str, version: Option<&VersionSpec>) -> Option<Tool>;

    async fn list_resources(&self) -> Vec<Resource>;
    async fn get_resource(&self, uri: &str) -> Option<Resource>;

    async fn list_resource_templates(&self) -> Vec<ResourceTemplate>;
    async fn get_resource_template(&self, uri: &str) -> Option<ResourceTemplate>;

    async fn list_prompts(&self) -> Vec<Prompt>;
    async fn get_prompt(&self, name: &str, version: Option<&VersionSpec>) -> Option<Prompt>;

    /// Resolve any component by its canonical `Key`, independent of kind.
    async fn get_component(&self, key: &Key) -> Option<()> {
        let _ = key;
        None
    }

    /// Tasks this provider exposes directly (optional; empty by default —
    /// spec §4.4).
    async fn list_tasks(&self) -> Vec<mcp_protocol::task::Task> {
        Vec::new()
    }

    async fn lifespan(&self) -> LifespanGuard {
        LifespanGuard::noop()
    }

    /// Invoke a tool this provider owns. Only `LocalProviderAdapter` and
    /// transforms/mounts over it actually run a handler; descriptor-only
    /// sources (`OpenApiProvider`, `ProxyProvider`) report not-found, since
    /// executing them is the job of their own named out-of-scope clients.
    async fn call_tool(&self, name: &str, version: Option<&VersionSpec>, args: Value, context: Context) -> McpResult<ToolOutput> {
        let _ = (version, args, context);
        Err(McpError::not_found("tool", name))
    }

    async fn read_resource(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        let _ = context;
        Err(McpError::not_found("resource", uri))
    }

    async fn read_resource_template(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        let _ = context;
        Err(McpError::not_found("resource template", uri))
    }

    async fn render_prompt(
        &self,
        name: &str,
        version: Option<&VersionSpec>,
        args: Value,
        context: Context,
    ) -> McpResult<Vec<PromptMessage>> {
        let _ = (version, args, context);
        Err(McpError::not_found("prompt", name))
    }
}

/// Wraps the always-first `LocalProvider` registry behind the `Provider`
/// trait so the dispatcher's provider chain can treat it uniformly with
/// mounted/transformed/remote sources.
pub struct LocalProviderAdapter {
    pub registry: Arc<tokio::sync::RwLock<LocalProvider>>,
}

#[async_trait]
impl Provider for LocalProviderAdapter {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_tools(&self) -> Vec<Tool> {
        self.registry.read().await.list_tools().map(|t| t.descriptor.clone()).collect()
    }

    async fn get_tool(&self, name: &str, version: Option<&VersionSpec>) -> Option<Tool> {
        self.registry.read().await.get_tool(name, version).map(|t| t.descriptor.clone())
    }

    async fn list_resources(&self) -> Vec<Resource> {
        self.registry.read().await.list_resources().map(|r| r.descriptor.clone()).collect()
    }

    async fn get_resource(&self, uri: &str) -> Option<Resource> {
        self.registry.read().await.get_resource(uri).map(|r| r.descriptor.clone())
    }

    async fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.registry.read().await.list_resource_templates().map(|t| t.descriptor.clone()).collect()
    }

    async fn get_resource_template(&self, uri: &str) -> Option<ResourceTemplate> {
        self.registry.read().await.match_resource_template(uri).map(|(t, _)| t.descriptor.clone())
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        self.registry.read().await.list_prompts().map(|p| p.descriptor.clone()).collect()
    }

    async fn get_prompt(&self, name: &str, version: Option<&VersionSpec>) -> Option<Prompt> {
        self.registry.read().await.get_prompt(name, version).map(|p| p.descriptor.clone())
    }

    async fn call_tool(&self, name: &str, version: Option<&VersionSpec>, args: Value, context: Context) -> McpResult<ToolOutput> {
        let registry = self.registry.read().await;
        let tool = registry.get_tool(name, version).ok_or_else(|| McpError::not_found("tool", name))?;
        (tool.handler)(args, context).await
    }

    async fn read_resource(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        let registry = self.registry.read().await;
        let resource = registry.get_resource(uri).ok_or_else(|| McpError::not_found("resource", uri))?;
        let handler = resource.handler.as_ref().ok_or_else(|| McpError::not_found("resource", uri))?;
        handler(context).await
    }

    async fn read_resource_template(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        let registry = self.registry.read().await;
        let (template, vars) =
            registry.match_resource_template(uri).ok_or_else(|| McpError::not_found("resource template", uri))?;
        (template.handler)(vars, context).await
    }

    async fn render_prompt(
        &self,
        name: &str,
        version: Option<&VersionSpec>,
        args: Value,
        context: Context,
    ) -> McpResult<Vec<PromptMessage>> {
        let registry = self.registry.read().await;
        let prompt = registry.get_prompt(name, version).ok_or_else(|| McpError::not_found("prompt", name))?;
        (prompt.handler)(args, context).await
    }
}

/// Wraps a child server, listing from it and forwarding invocations to its
/// own dispatcher (spec §4.4). The child's middleware and lifespan run
/// during parent requests — this adapter only needs the child's `Provider`
/// view plus a callable that performs a full child-server dispatch.
pub struct MountedProvider {
    pub label: String,
    pub child: Arc<dyn Provider>,
}

#[async_trait]
impl Provider for MountedProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_tools(&self) -> Vec<Tool> {
        self.child.list_tools().await
    }

    async fn get_tool(&self, name: &str, version: Option<&VersionSpec>) -> Option<Tool> {
        self.child.get_tool(name, version).await
    }

    async fn list_resources(&self) -> Vec<Resource> {
        self.child.list_resources().await
    }

    async fn get_resource(&self, uri: &str) -> Option<Resource> {
        self.child.get_resource(uri).await
    }

    async fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.child.list_resource_templates().await
    }

    async fn get_resource_template(&self, uri: &str) -> Option<ResourceTemplate> {
        self.child.get_resource_template(uri).await
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        self.child.list_prompts().await
    }

    async fn get_prompt(&self, name: &str, version: Option<&VersionSpec>) -> Option<Prompt> {
        self.child.get_prompt(name, version).await
    }

    async fn lifespan(&self) -> LifespanGuard {
        self.child.lifespan().await
    }

    async fn call_tool(&self, name: &str, version: Option<&VersionSpec>, args: Value, context: Context) -> McpResult<ToolOutput> {
        self.child.call_tool(name, version, args, context).await
    }

    async fn read_resource(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        self.child.read_resource(uri, context).await
    }

    async fn read_resource_template(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        self.child.read_resource_template(uri, context).await
    }

    async fn render_prompt(
        &self,
        name: &str,
        version: Option<&VersionSpec>,
        args: Value,
        context: Context,
    ) -> McpResult<Vec<PromptMessage>> {
        self.child.render_prompt(name, version, args, context).await
    }
}

/// Applies a namespace prefix (`ns_name`) and/or URI scheme/host rewrite
/// (`scheme://ns/path`) to everything an inner provider exposes, plus an
/// optional rename map that bypasses prefixing (spec §4.4). Renamed targets
/// must be unique — enforced at construction.
pub struct TransformingProvider {
    pub inner: Arc<dyn Provider>,
    pub namespace: Option<String>,
    pub tool_renames: HashMap<String, String>,
}

impl TransformingProvider {
    pub fn new(inner: Arc<dyn Provider>, namespace: Option<String>) -> Self {
        Self { inner, namespace, tool_renames: HashMap::new() }
    }

    pub fn with_renames(mut self, renames: HashMap<String, String>) -> Result<Self, String> {
        let mut seen = std::collections::HashSet::new();
        for target in renames.values() {
            if !seen.insert(target.clone()) {
                return Err(format!("duplicate tool rename target '{target}'"));
            }
        }
        self.tool_renames = renames;
        Ok(self)
    }

    fn transform_name(&self, name: &str) -> String {
        if let Some(renamed) = self.tool_renames.get(name) {
            return renamed.clone();
        }
        match &self.namespace {
            Some(ns) => format!("{ns}_{name}"),
            None => name.to_string(),
        }
    }

    fn untransform_name(&self, name: &str) -> Option<String> {
        if let Some((original, _)) = self.tool_renames.iter().find(|(_, renamed)| renamed.as_str() == name) {
            return Some(original.clone());
        }
        match &self.namespace {
            Some(ns) => name.strip_prefix(&format!("{ns}_")).map(str::to_string),
            None => Some(name.to_string()),
        }
    }

    fn transform_uri(&self, uri: &str) -> String {
        let Some(ns) = &self.namespace else { return uri.to_string() };
        match uri.split_once("://") {
            Some((scheme, rest)) => format!("{scheme}://{ns}/{rest}"),
            None => uri.to_string(),
        }
    }

    fn untransform_uri(&self, uri: &str) -> Option<String> {
        let Some(ns) = &self.namespace else { return Some(uri.to_string()) };
        let (scheme, rest) = uri.split_once("://")?;
        let rest = rest.strip_prefix(&format!("{ns}/"))?;
        Some(format!("{scheme}://{rest}"))
    }
}

#[async_trait]
impl Provider for TransformingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_tools(&self) -> Vec<Tool> {
        self.inner
            .list_tools()
            .await
            .into_iter()
            .map(|mut t| {
                t.meta.name = self.transform_name(&t.meta.name);
                t
            })
            .collect()
    }

    async fn get_tool(&self, name: &str, version: Option<&VersionSpec>) -> Option<Tool> {
        let original = self.untransform_name(name)?;
        let mut tool = self.inner.get_tool(&original, version).await?;
        tool.meta.name = self.transform_name(&tool.meta.name);
        Some(tool)
    }

    async fn list_resources(&self) -> Vec<Resource> {
        self.inner
            .list_resources()
            .await
            .into_iter()
            .map(|mut r| {
                r.uri = self.transform_uri(&r.uri);
                r
            })
            .collect()
    }

    async fn get_resource(&self, uri: &str) -> Option<Resource> {
        let original = self.untransform_uri(uri)?;
        let mut resource = self.inner.get_resource(&original).await?;
        resource.uri = self.transform_uri(&resource.uri);
        Some(resource)
    }

    async fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.inner
            .list_resource_templates()
            .await
            .into_iter()
            .map(|mut t| {
                t.uri_template = self.transform_uri(&t.uri_template);
                t
            })
            .collect()
    }

    async fn get_resource_template(&self, uri: &str) -> Option<ResourceTemplate> {
        let original = self.untransform_uri(uri)?;
        let mut template = self.inner.get_resource_template(&original).await?;
        template.uri_template = self.transform_uri(&template.uri_template);
        Some(template)
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        self.inner
            .list_prompts()
            .await
            .into_iter()
            .map(|mut p| {
                p.meta.name = self.transform_name(&p.meta.name);
                p
            })
            .collect()
    }

    async fn get_prompt(&self, name: &str, version: Option<&VersionSpec>) -> Option<Prompt> {
        let original = self.untransform_name(name)?;
        let mut prompt = self.inner.get_prompt(&original, version).await?;
        prompt.meta.name = self.transform_name(&prompt.meta.name);
        Some(prompt)
    }

    async fn lifespan(&self) -> LifespanGuard {
        self.inner.lifespan().await
    }

    async fn call_tool(&self, name: &str, version: Option<&VersionSpec>, args: Value, context: Context) -> McpResult<ToolOutput> {
        let original = self.untransform_name(name).ok_or_else(|| McpError::not_found("tool", name))?;
        self.inner.call_tool(&original, version, args, context).await
    }

    async fn read_resource(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        let original = self.untransform_uri(uri).ok_or_else(|| McpError::not_found("resource", uri))?;
        self.inner.read_resource(&original, context).await
    }

    async fn read_resource_template(&self, uri: &str, context: Context) -> McpResult<ResourceOutput> {
        let original = self.untransform_uri(uri).ok_or_else(|| McpError::not_found("resource template", uri))?;
        self.inner.read_resource_template(&original, context).await
    }

    async fn render_prompt(
        &self,
        name: &str,
        version: Option<&VersionSpec>,
        args: Value,
        context: Context,
    ) -> McpResult<Vec<PromptMessage>> {
        let original = self.untransform_name(name).ok_or_else(|| McpError::not_found("prompt", name))?;
        self.inner.render_prompt(&original, version, args, context).await
    }
}

/// A provider built directly from a pre-derived component list (spec
/// §4.4.1: "derives tools/resources/templates from an OpenAPI document" —
/// the derivation itself is a named out-of-scope collaborator; this struct
/// is the interface it plugs into).
#[derive(Default)]
pub struct OpenApiProvider {
    pub label: String,
    pub tools: Vec<Tool>,
    pub resources: Vec<Resource>,
    pub templates: Vec<ResourceTemplate>,
}

#[async_trait]
impl Provider for OpenApiProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    async fn get_tool(&self, name: &str, _version: Option<&VersionSpec>) -> Option<Tool> {
        self.tools.iter().find(|t| t.meta.name == name).cloned()
    }

    async fn list_resources(&self) -> Vec<Resource> {
        self.resources.clone()
    }

    async fn get_resource(&self, uri: &str) -> Option<Resource> {
        self.resources.iter().find(|r| r.uri == uri).cloned()
    }

    async fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.templates.clone()
    }

    async fn get_resource_template(&self, uri: &str) -> Option<ResourceTemplate> {
        self.templates.iter().find(|t| t.uri_template == uri).cloned()
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        Vec::new()
    }

    async fn get_prompt(&self, _name: &str, _version: Option<&VersionSpec>) -> Option<Prompt> {
        None
    }
}

/// Represents a remote MCP server through a session factory (spec §4.4):
/// reuses a connected session or creates fresh sessions per request
/// depending on connection state. The wire client itself is a named
/// out-of-scope collaborator; this struct models only the reuse-or-create
/// decision and the `Provider` surface it must present.
pub struct ProxyProvider {
    pub label: String,
    session: tokio::sync::Mutex<Option<Arc<dyn ProxySession>>>,
    factory: Arc<dyn Fn() -> Arc<dyn ProxySession> + Send + Sync>,
}

/// A connected remote session. `is_connected` lets `ProxyProvider` decide
/// whether to reuse it or ask the factory for a fresh one.
#[async_trait]
pub trait ProxySession: Send + Sync {
    fn is_connected(&self) -> bool;
    async fn list_tools(&self) -> Vec<Tool>;
    async fn get_tool(&self, name: &str) -> Option<Tool>;
}

impl ProxyProvider {
    pub fn new(label: impl Into<String>, factory: Arc<dyn Fn() -> Arc<dyn ProxySession> + Send + Sync>) -> Self {
        Self { label: label.into(), session: tokio::sync::Mutex::new(None), factory }
    }

    async fn session(&self) -> Arc<dyn ProxySession> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if session.is_connected() {
                return session.clone();
            }
        }
        let fresh = (self.factory)();
        *guard = Some(fresh.clone());
        fresh
    }
}

#[async_trait]
impl Provider for ProxyProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_tools(&self) -> Vec<Tool> {
        self.session().await.list_tools().await
    }

    async fn get_tool(&self, name: &str, _version: Option<&VersionSpec>) -> Option<Tool> {
        self.session().await.get_tool(name).await
    }

    async fn list_resources(&self) -> Vec<Resource> {
        Vec::new()
    }

    async fn get_resource(&self, _uri: &str) -> Option<Resource> {
        None
    }

    async fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        Vec::new()
    }

    async fn get_resource_template(&self, _uri: &str) -> Option<ResourceTemplate> {
        None
    }

    async fn list_prompts(&self) -> Vec<Prompt> {
        Vec::new()
    }

    async fn get_prompt(&self, _name: &str, _version: Option<&VersionSpec>) -> Option<Prompt> {
        None
    }
}
