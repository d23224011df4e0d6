//! Elicitation (spec: `context.py`'s `elicit(message, response_type)`): the
//! host round trip that asks the client's user for a small piece of missing
//! information mid-call. Mirrors `sampling.rs`'s `SampleClient` shape —
//! one call out to the client capability, no looping.

use async_trait::async_trait;
use mcp_protocol::McpResult;
use serde_json::Value;

/// How the user (via the client) responded to an elicitation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// The client's reply to `Context::elicit` (spec: `AcceptedElicitation` /
/// `DeclinedElicitation` / `CancelledElicitation`, collapsed into one shape
/// since the core only needs to route the outcome, not type it per call
/// site the way the original's generics do). `content` is `None` unless
/// `action` is `Accept`.
#[derive(Debug, Clone)]
pub struct ElicitOutcome {
    pub action: ElicitAction,
    pub content: Option<Value>,
}

/// The host-provided elicitation capability (spec: "via the client
/// capability"). `requested_schema` is always an object schema — a bare
/// primitive `response_type` is wrapped in `{value: <inner>}` by the caller
/// before it reaches here, the same convention `sample`'s `final_response`
/// tool uses for non-object result types.
#[async_trait]
pub trait ElicitClient: Send + Sync {
    async fn elicit(&self, message: &str, requested_schema: Value) -> McpResult<ElicitOutcome>;
}
