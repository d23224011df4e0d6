//! Unified error taxonomy for the MCP core (spec §7).
//!
//! Every error the core produces is one of the variants below, independent
//! of which component kind or request kind raised it. The dispatcher is the
//! single place that translates these into protocol-level responses; this
//! type only carries the information needed to do that translation.

/// Result alias used throughout the core.
pub type McpResult<T> = Result<T, McpError>;

/// Errors produced by the component registry, dispatcher, and execution
/// engine.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// No component matched by name/uri/key/version. Also the externally
    /// surfaced form of `Disabled` (spec §7: the two are indistinguishable
    /// to a caller, to avoid leaking presence of a disabled component).
    #[error("Unknown {kind}: '{name}'")]
    NotFound { kind: &'static str, name: String },

    /// A matched component had `enabled = false` or was filtered out by a
    /// tag/version/session rule. Never surfaced directly — the dispatcher
    /// maps this to `NotFound` before it reaches a caller (testable
    /// property 4).
    #[error("{kind} '{name}' is disabled")]
    Disabled { kind: &'static str, name: String },

    /// Argument failed schema validation or coercion. Never masked by
    /// `mask_error_details`, and always surfaced as a protocol-level
    /// invalid-params error rather than a tool error.
    #[error("Invalid arguments: {0}")]
    ValidationError(String),

    /// An exception raised by user code while invoking a tool.
    #[error("Tool '{name}' failed: {message}")]
    ToolError {
        name: String,
        message: String,
        /// Set when the user explicitly raised this as a `ToolError`, in
        /// which case masking never hides the message (spec §7).
        explicit: bool,
    },

    /// An exception raised by user code while reading a resource.
    #[error("Resource '{uri}' failed: {message}")]
    ResourceError { uri: String, message: String },

    /// An exception raised by user code while rendering a prompt.
    #[error("Prompt '{name}' failed: {message}")]
    PromptError { name: String, message: String },

    /// A failure surfaced by the task queue via `tasks/result`.
    #[error("Task '{task_id}' failed: {message}")]
    TaskError { task_id: String, message: String },

    /// A component's task mode forbids or requires backgrounding and the
    /// request didn't match (spec §4.11).
    #[error("Tool '{name}' requires task mode '{mode}' but none was requested")]
    TaskModeRequired { name: String, mode: &'static str },

    /// Registering two components whose `(kind, name, version)` collide
    /// under duplicate policy `error` (testable property 2), or mixing a
    /// versioned and unversioned component under the same name (testable
    /// property 3).
    #[error("Duplicate registration: {0}")]
    DuplicateComponent(String),

    /// A component definition itself is malformed (e.g. a non-object input
    /// schema, or an invalid URI).
    #[error("Invalid component definition: {0}")]
    InvalidComponent(String),

    /// Unknown JSON-RPC method or malformed payload (spec §7, "Protocol /
    /// framework errors").
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    pub fn disabled(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Disabled { kind, name: name.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn tool_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError { name: name.into(), message: message.into(), explicit: false }
    }

    /// A `ToolError` explicitly raised by user code — bypasses
    /// `mask_error_details` per spec §4.8 / §7.
    pub fn explicit_tool_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError { name: name.into(), message: message.into(), explicit: true }
    }

    /// Resolve this error down to the message shown to the caller, honoring
    /// `mask_error_details`. Validation errors and explicit `ToolError`s are
    /// never masked (spec §7).
    pub fn user_message(&self, mask_error_details: bool) -> String {
        match self {
            McpError::ToolError { name, message, explicit } => {
                if !mask_error_details || *explicit {
                    format!("Tool '{name}' failed: {message}")
                } else {
                    format!("Tool '{name}' failed")
                }
            }
            McpError::ResourceError { uri, .. } if mask_error_details => {
                format!("Resource '{uri}' failed")
            }
            McpError::PromptError { name, .. } if mask_error_details => {
                format!("Prompt '{name}' failed")
            }
            other => other.to_string(),
        }
    }

    /// True for kinds that the dispatcher never masks regardless of
    /// `mask_error_details` (spec §7).
    pub fn is_unmaskable(&self) -> bool {
        matches!(self, McpError::ValidationError(_))
            || matches!(self, McpError::ToolError { explicit: true, .. })
    }
}
