use std::future::Future;
use std::pin::Pin;

use mcp_protocol::{ContentBlock, McpResult, Prompt, PromptMessage, Resource, ResourceTemplate, Tool, ToolResult};
use serde_json::Value;

use crate::context::Context;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One element of a tool's return value, before normalization (spec §4.9,
/// "apply in order, per element of a top-level list"). A handler returning
/// a single value is the degenerate one-item case.
#[derive(Debug, Clone)]
pub enum ToolItem {
    /// A protocol content block, passed through unchanged.
    Content(ContentBlock),
    /// Raw bytes: wrapped as UTF-8 text when valid, otherwise as a binary
    /// embedded resource (spec §4.9).
    Bytes(Vec<u8>),
    Text(String),
    /// A structured value: serialized to JSON text *and* set as
    /// `structured_content`, wrapped in `{result: ...}` when the tool's
    /// output schema is wrapped (spec §4.9).
    Structured(Value),
}

/// What a tool callable hands back to the execution engine (spec §4.9).
/// `Explicit` bypasses every normalization rule.
pub enum ToolOutput {
    Items(Vec<ToolItem>),
    Explicit(ToolResult),
}

impl ToolOutput {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Items(vec![ToolItem::Text(s.into())])
    }

    pub fn structured(value: Value) -> Self {
        Self::Items(vec![ToolItem::Structured(value)])
    }
}

/// The callable behind a registered tool. Takes the already-validated and
/// coerced argument object plus the request's injected `Context`, returns
/// the pre-normalization return value the execution engine turns into
/// content blocks (spec §4.9) — the wire-level `Tool` descriptor stays pure
/// data, the behavior lives here instead.
pub type ToolHandler = Box<dyn Fn(Value, Context) -> BoxFuture<'static, McpResult<ToolOutput>> + Send + Sync>;

/// The callable behind a dynamic resource. Returns either UTF-8 text or raw
/// bytes; the execution engine decides which content-block shape to emit.
pub type ResourceHandler = Box<dyn Fn(Context) -> BoxFuture<'static, McpResult<ResourceOutput>> + Send + Sync>;

/// The callable behind a resource template: receives the path/query
/// parameters extracted by the URI matcher.
pub type ResourceTemplateHandler =
    Box<dyn Fn(std::collections::HashMap<String, String>, Context) -> BoxFuture<'static, McpResult<ResourceOutput>> + Send + Sync>;

/// The callable behind a prompt: receives caller-supplied arguments and
/// renders one or more messages.
pub type PromptHandler =
    Box<dyn Fn(Value, Context) -> BoxFuture<'static, McpResult<Vec<PromptMessage>>> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum ResourceOutput {
    Text(String),
    Bytes(Vec<u8>),
}

pub struct RegisteredTool {
    pub descriptor: Tool,
    pub handler: ToolHandler,
}

pub struct RegisteredResource {
    pub descriptor: Resource,
    pub handler: Option<ResourceHandler>,
}

pub struct RegisteredResourceTemplate {
    pub descriptor: ResourceTemplate,
    pub handler: ResourceTemplateHandler,
}

pub struct RegisteredPrompt {
    pub descriptor: Prompt,
    pub handler: PromptHandler,
}
