//! Component registry, dispatch pipeline, and execution engine for MCP
//! servers (spec §§3-5): the provider chain, middleware, task subsystem,
//! and the `McpServer` that ties them together behind a builder API.
//! `mcp-protocol` defines the component/error/wire model this crate
//! operates on; `mcp-rpc` defines the JSON-RPC envelope `McpServer` routes.

pub mod builder;
pub mod context;
pub mod dispatch;
pub mod elicitation;
pub mod execute;
pub mod handler;
pub mod middleware;
pub mod provider;
pub mod registry;
pub mod sampling;
pub mod server;
pub mod task;
pub mod transform;
pub mod uri_template;

pub use builder::{PromptBuilder, ResourceBuilder, ResourceTemplateBuilder, ToolBuilder};
pub use context::Context;
pub use dispatch::{Dispatcher, Filters};
pub use provider::{LifespanGuard, Provider};
pub use registry::{DuplicatePolicy, LocalProvider};
pub use server::{McpServer, RunningServer, ServerBuilder};

/// The MCP protocol version this server speaks, reported verbatim in
/// `initialize` responses (spec §6). Matches the most recent revision with
/// structured `_meta`, cursor, and progress-token support.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Validate `value` against a JSON Schema without coercion, for call sites
/// (the sampling loop's `final_response` tool, spec §4.12) that need a
/// pass/fail check rather than the coerced value `mcp_schema::validate_and_coerce`
/// returns.
pub fn validate_payload(schema: &serde_json::Value, value: &serde_json::Value) -> Result<(), String> {
    mcp_schema::validate_and_coerce(schema, value.clone(), true).map(|_| ()).map_err(|e| e.to_string())
}
