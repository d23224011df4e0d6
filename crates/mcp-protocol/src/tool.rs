//! Tool descriptor (spec §3, "Tool").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::ComponentMeta;
use crate::key::Kind;

/// Read-only/idempotent/destructive hints a client may use for confirmation
/// UX. Purely advisory — the core never enforces them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnnotations {
    #[serde(default, rename = "readOnlyHint")]
    pub read_only: bool,
    #[serde(default, rename = "idempotentHint")]
    pub idempotent: bool,
    #[serde(default, rename = "destructiveHint")]
    pub destructive: bool,
}

/// Whether a tool may/must/can-never be backgrounded (spec §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Optional,
    Required,
    Forbidden,
}

impl TaskMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskMode::Optional => "optional",
            TaskMode::Required => "required",
            TaskMode::Forbidden => "forbidden",
        }
    }
}

impl Default for TaskMode {
    fn default() -> Self {
        TaskMode::Forbidden
    }
}

/// Per-component task configuration (spec §4.11, `TaskConfig`).
#[derive(Debug, Clone, Default)]
pub struct TaskConfig {
    pub mode: TaskMode,
    /// Time-to-live applied to a task created from this tool, in seconds.
    pub ttl: Option<u64>,
}

/// A registered tool's descriptive metadata and schema. Execution behavior
/// (the callable) is attached separately by `mcp-server`'s `RegisteredTool`,
/// which pairs a `Tool` descriptor with a handler closure — this type stays
/// pure data so it serializes straight to the `tools/list` wire shape.
#[derive(Debug, Clone)]
pub struct Tool {
    pub meta: ComponentMeta,
    /// Always object-typed (spec §3 invariant).
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub annotations: Option<ToolAnnotations>,
    /// Parameter names dropped from the schema and satisfied by dependency
    /// injection instead of caller-supplied arguments.
    pub exclude_args: Vec<String>,
    pub task_config: TaskConfig,
}

impl Tool {
    pub fn key(&self) -> crate::key::Key {
        self.meta.key(Kind::Tool)
    }

    /// Framework metadata (tags, version) surfaced under `_fastmcp` inside
    /// `meta` when `include_fastmcp_meta` is enabled (spec §6, §9 open
    /// question). Explicit user-supplied `meta` is always preserved
    /// verbatim regardless of this flag.
    pub fn wire_meta(&self, include_framework_meta: bool) -> Option<HashMap<String, Value>> {
        let mut out = self.meta.meta.clone();
        if include_framework_meta {
            let mut fastmcp = serde_json::Map::new();
            fastmcp.insert(
                "tags".to_string(),
                Value::Array(self.meta.tags.iter().cloned().map(Value::String).collect()),
            );
            if let Some(v) = &self.meta.version {
                fastmcp.insert("version".to_string(), Value::String(v.clone()));
            }
            out.insert("_fastmcp".to_string(), Value::Object(fastmcp));
        }
        if out.is_empty() { None } else { Some(out) }
    }
}
