use serde::{Deserialize, Serialize};
use serde_json::Value;

use mcp_protocol::McpError;

/// Standard JSON-RPC 2.0 error codes plus the MCP-specific extensions this
/// core needs.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Used for `NotFound`/`Disabled` component lookups — not a wire-level
    /// protocol failure, but not `InvalidParams` either.
    pub const UNKNOWN_COMPONENT: i64 = -32001;
    pub const TASK_ERROR: i64 = -32002;
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Translate the core's unified error taxonomy (spec §7) into a wire
    /// error. `ValidationError` always maps to `InvalidParams`; `NotFound`
    /// and `Disabled` both map to `UnknownComponent` (never leaking which
    /// one actually happened); everything else is an internal error, with
    /// the message subject to `mask_error_details` via `McpError::user_message`.
    pub fn from_mcp_error(err: &McpError, mask_error_details: bool) -> Self {
        match err {
            McpError::ValidationError(msg) => Self::invalid_params(msg),
            McpError::NotFound { kind, name } => {
                Self::new(codes::UNKNOWN_COMPONENT, format!("Unknown {kind}: '{name}'"))
            }
            McpError::Disabled { kind, name } => {
                Self::new(codes::UNKNOWN_COMPONENT, format!("Unknown {kind}: '{name}'"))
            }
            McpError::TaskError { .. } => Self::new(codes::TASK_ERROR, err.user_message(mask_error_details)),
            other => Self::new(codes::INTERNAL_ERROR, other.user_message(mask_error_details)),
        }
    }
}
