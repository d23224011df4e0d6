//! Execution engine (spec §4.9, C9): argument coercion, dependency
//! injection, task-mode branching, and output normalization. This module
//! sits between the dispatcher's provider traversal and a component's
//! callable.

use mcp_protocol::{ContentBlock, McpError, McpResult, ResourceContent, Tool, ToolResult};
use mcp_schema::WRAP_RESULT_MARKER;
use serde_json::Value;

use crate::context::Context;
use crate::handler::{ResourceOutput, ToolItem, ToolOutput};
use crate::provider::Provider;
use std::sync::Arc;

/// Whether a call should run inline or be handed to the task queue (spec
/// §4.9 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDecision {
    RunSync,
    Background,
}

/// Decide the task-mode path for a tool invocation, given whether the
/// caller attached task metadata to the request (spec §4.11's graceful
/// degradation rules, invoked from §4.9 step 3).
pub fn decide_task_path(tool: &Tool, task_requested: bool) -> McpResult<TaskDecision> {
    use mcp_protocol::TaskMode::*;
    match (tool.task_config.mode, task_requested) {
        (Required, false) => {
            Err(McpError::TaskModeRequired { name: tool.meta.name.clone(), mode: "required" })
        }
        (Required, true) => Ok(TaskDecision::Background),
        // A forbidden tool asked to run as a task degrades gracefully: it
        // still runs synchronously, the caller just gets back a task
        // wrapper whose state is immediately `completed` (spec §4.9).
        (Forbidden, _) => Ok(TaskDecision::RunSync),
        (Optional, true) => Ok(TaskDecision::Background),
        (Optional, false) => Ok(TaskDecision::RunSync),
    }
}

/// Coerce and validate arguments against a tool's input schema (spec §4.9
/// step 1). Excluded/injected parameters are already absent from the
/// schema (dropped at derivation time, see `mcp_schema::derive_input_schema`),
/// so nothing further needs stripping here.
pub fn prepare_args(tool: &Tool, args: Value, strict: bool) -> McpResult<Value> {
    mcp_schema::validate_and_coerce(&tool.input_schema, args, strict)
        .map_err(|e| McpError::validation(e.to_string()))
}

/// Run a tool's callable through its provider and normalize the result
/// (spec §4.9 steps 1, 2 handled by the caller via `Context`/task-locals;
/// this function covers steps 1 argument prep, 4, and 5).
pub async fn invoke_tool(
    provider: &Arc<dyn Provider>,
    tool: &Tool,
    version: Option<&mcp_protocol::VersionSpec>,
    args: Value,
    context: Context,
    strict_input_validation: bool,
) -> McpResult<ToolResult> {
    let coerced = prepare_args(tool, args, strict_input_validation)?;
    let output = provider
        .call_tool(&tool.meta.name, version, coerced, context)
        .await
        .map_err(|e| wrap_tool_error(&tool.meta.name, e))?;
    Ok(normalize_tool_output(output, tool.output_schema.as_ref()))
}

fn wrap_tool_error(name: &str, err: McpError) -> McpError {
    match err {
        // Already a well-known taxonomy member (validation, not-found,
        // task mode, an already-explicit tool error) — pass through.
        McpError::ValidationError(_)
        | McpError::NotFound { .. }
        | McpError::Disabled { .. }
        | McpError::TaskModeRequired { .. }
        | McpError::ToolError { explicit: true, .. } => err,
        other => McpError::tool_error(name, other.to_string()),
    }
}

/// Normalize a tool's return value into the wire-level `ToolResult` (spec
/// §4.9 steps 4-5).
fn normalize_tool_output(output: ToolOutput, output_schema: Option<&Value>) -> ToolResult {
    let items = match output {
        ToolOutput::Explicit(result) => return result,
        ToolOutput::Items(items) => items,
    };

    let wrapped = output_schema.map(|s| s.get(WRAP_RESULT_MARKER).is_some()).unwrap_or(false);

    let mut content = Vec::new();
    let mut structured_content = None;
    for item in items {
        match item {
            ToolItem::Content(block) => push_merged(&mut content, block),
            ToolItem::Bytes(bytes) => push_merged(&mut content, content_block_for_bytes(bytes)),
            ToolItem::Text(text) => push_merged(&mut content, ContentBlock::text(text)),
            ToolItem::Structured(value) => {
                let text = serde_json::to_string(&value).unwrap_or_default();
                push_merged(&mut content, ContentBlock::text(text));
                let wrapped_value =
                    if wrapped { serde_json::json!({ "result": value }) } else { value };
                structured_content = Some(wrapped_value);
            }
        }
    }

    ToolResult { content, structured_content, is_error: false }
}

/// Push `block` onto `content`, merging it into the previous block when
/// both are plain text (spec §4.9 step 5: "adjacent non-protocol items...
/// collapse into a single combined text block; content blocks... never
/// merge" — both sides of a merge candidate must be plain `Text`, since a
/// `Bytes` item only ever produces `Text` when it decodes as UTF-8, and
/// that case is itself mergeable).
fn push_merged(content: &mut Vec<ContentBlock>, block: ContentBlock) {
    if block.is_mergeable_text() {
        if let Some(ContentBlock::Text { text: prev }) = content.last_mut() {
            if let ContentBlock::Text { text: next } = &block {
                prev.push_str(next);
                return;
            }
        }
    }
    content.push(block);
}

fn content_block_for_bytes(bytes: Vec<u8>) -> ContentBlock {
    match String::from_utf8(bytes) {
        Ok(text) => ContentBlock::text(text),
        Err(err) => {
            use base64::Engine;
            let bytes = err.into_bytes();
            ContentBlock::EmbeddedResource {
                uri: "data:application/octet-stream".to_string(),
                mime_type: "application/octet-stream".to_string(),
                blob: base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        }
    }
}

/// Read a resource or resource template through its provider and wrap the
/// result into a `ResourceContent` (spec §4.9, "For a resource read").
pub async fn read_resource(
    provider: &Arc<dyn Provider>,
    uri: &str,
    declared_mime_type: Option<String>,
    context: Context,
    is_template: bool,
) -> McpResult<ResourceContent> {
    let output = if is_template {
        provider.read_resource_template(uri, context).await?
    } else {
        provider.read_resource(uri, context).await?
    };
    let (content, mime_type) = match output {
        ResourceOutput::Text(text) => (vec![ContentBlock::text(text)], declared_mime_type.or(Some("text/plain".to_string()))),
        ResourceOutput::Bytes(bytes) => {
            use base64::Engine;
            let mime = declared_mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
            (
                vec![ContentBlock::EmbeddedResource {
                    uri: uri.to_string(),
                    mime_type: mime.clone(),
                    blob: base64::engine::general_purpose::STANDARD.encode(bytes),
                }],
                Some(mime),
            )
        }
    };
    Ok(ResourceContent { uri: uri.to_string(), mime_type, content, meta: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxFuture;
    use mcp_protocol::{ComponentMeta, TaskConfig, TaskMode};
    use serde_json::json;

    fn tool_with_mode(mode: TaskMode) -> Tool {
        Tool {
            meta: ComponentMeta::new("t").unwrap(),
            input_schema: json!({"type": "object", "properties": {}}),
            output_schema: None,
            annotations: None,
            exclude_args: vec![],
            task_config: TaskConfig { mode, ttl: None },
        }
    }

    #[test]
    fn required_mode_without_task_metadata_errors() {
        let tool = tool_with_mode(TaskMode::Required);
        let err = decide_task_path(&tool, false).unwrap_err();
        assert!(matches!(err, McpError::TaskModeRequired { .. }));
    }

    #[test]
    fn forbidden_mode_with_task_metadata_runs_sync() {
        let tool = tool_with_mode(TaskMode::Forbidden);
        assert_eq!(decide_task_path(&tool, true).unwrap(), TaskDecision::RunSync);
    }

    #[test]
    fn optional_mode_follows_the_request() {
        let tool = tool_with_mode(TaskMode::Optional);
        assert_eq!(decide_task_path(&tool, true).unwrap(), TaskDecision::Background);
        assert_eq!(decide_task_path(&tool, false).unwrap(), TaskDecision::RunSync);
    }

    #[test]
    fn adjacent_text_items_merge_into_one_block() {
        let output = ToolOutput::Items(vec![ToolItem::Text("a".into()), ToolItem::Text("b".into())]);
        let result = normalize_tool_output(output, None);
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.content[0], ContentBlock::text("ab"));
    }

    #[test]
    fn structured_value_sets_both_text_and_structured_content() {
        let output = ToolOutput::Items(vec![ToolItem::Structured(json!({"x": 1}))]);
        let result = normalize_tool_output(output, None);
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.structured_content, Some(json!({"x": 1})));
    }

    #[test]
    fn primitive_structured_value_is_wrapped_when_schema_says_so() {
        let schema = json!({"type": "object", WRAP_RESULT_MARKER: true});
        let output = ToolOutput::Items(vec![ToolItem::Structured(json!(42))]);
        let result = normalize_tool_output(output, Some(&schema));
        assert_eq!(result.structured_content, Some(json!({"result": 42})));
    }

    #[test]
    fn explicit_tool_result_bypasses_normalization() {
        let explicit = ToolResult::error("boom");
        let output = ToolOutput::Explicit(explicit.clone());
        let result = normalize_tool_output(output, None);
        assert!(result.is_error);
        assert_eq!(result.content, explicit.content);
    }
}
