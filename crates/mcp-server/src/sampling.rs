//! Sampling sub-pipeline (spec §4.12, C12): the framework asking the host's
//! LLM to complete a message, optionally looping with local tool execution
//! until a typed `result_type` is produced.

use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::{ContentBlock, McpError, McpResult, Role};
use serde_json::Value;

use crate::handler::BoxFuture;

/// One message in a sampling conversation.
#[derive(Debug, Clone)]
pub struct SampleMessage {
    pub role: Role,
    pub content: ContentBlock,
}

impl SampleMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: ContentBlock::text(text) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: ContentBlock::text(text) }
    }

    pub fn tool_result(text: impl Into<String>, is_error: bool) -> Self {
        let _ = is_error; // carried in surrounding text per spec: "fed back to the model"
        Self { role: Role::User, content: ContentBlock::text(text) }
    }
}

/// A tool the model may call during a sampling loop.
#[derive(Debug, Clone)]
pub struct SampleTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A single requested tool invocation from the model's response.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    Required,
    None,
}

/// The host-provided LLM completion capability (spec §4.12: "via the client
/// capability (or a local fallback handler)"). One call is one LLM request;
/// looping is the pipeline's job, not the client's.
#[async_trait]
pub trait SampleClient: Send + Sync {
    async fn complete(
        &self,
        history: &[SampleMessage],
        tools: &[SampleTool],
        tool_choice: ToolChoice,
    ) -> McpResult<CompletionResponse>;
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// The result of exactly one LLM request (spec §4.12).
#[derive(Debug, Clone)]
pub struct SampleStep {
    pub response: CompletionResponse,
    pub history: Vec<SampleMessage>,
    pub is_tool_use: bool,
    pub tool_calls: Vec<ToolCall>,
    pub text: Option<String>,
}

/// A locally-executable tool, invoked by the sampling loop when the model
/// requests it (spec §4.12: "the step runs each requested tool locally").
pub type LocalToolExecutor =
    Arc<dyn Fn(String, Value) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

const SAFETY_CAP: usize = 100;

/// Perform exactly one LLM request. If `tools` is non-empty and
/// `execute_tools` is true (the default), run each requested tool locally
/// via `executor` and append its result to the returned history.
pub async fn sample_step(
    client: &dyn SampleClient,
    mut history: Vec<SampleMessage>,
    tools: &[SampleTool],
    tool_choice: ToolChoice,
    executor: Option<&LocalToolExecutor>,
    execute_tools: bool,
) -> McpResult<SampleStep> {
    let response = client.complete(&history, tools, tool_choice).await?;
    let is_tool_use = !response.tool_calls.is_empty();

    if let Some(text) = &response.text {
        history.push(SampleMessage::assistant(text));
    }

    if is_tool_use && execute_tools {
        if let Some(executor) = executor {
            for call in &response.tool_calls {
                let outcome = executor(call.name.clone(), call.arguments.clone()).await;
                let message = match outcome {
                    Ok(value) => SampleMessage::tool_result(
                        format!("{}: {}", call.name, value),
                        false,
                    ),
                    Err(err) => SampleMessage::tool_result(
                        format!("{}: error: {}", call.name, err),
                        true,
                    ),
                };
                history.push(message);
            }
        }
    }

    Ok(SampleStep {
        text: response.text.clone(),
        tool_calls: response.tool_calls.clone(),
        response,
        history,
        is_tool_use,
    })
}

/// Derive the synthesized `final_response` tool for a typed `result_type`
/// (spec §4.12: "parameters schema is derived from `result_type`, primitives
/// wrapped in `{value: <inner>}`").
pub fn final_response_tool(result_schema: &Value) -> SampleTool {
    let already_object = result_schema.get("type").and_then(Value::as_str) == Some("object");
    let schema = if already_object {
        result_schema.clone()
    } else {
        serde_json::json!({
            "type": "object",
            "properties": { "value": result_schema },
            "required": ["value"],
        })
    };
    SampleTool {
        name: "final_response".to_string(),
        description: Some("Call this with the final structured result.".to_string()),
        input_schema: schema,
    }
}

/// Loop `sample_step` until the model calls `final_response` (when
/// `result_type` is set) or stops requesting tools, up to a safety cap of
/// ~100 iterations (spec §4.12).
pub async fn sample(
    client: &dyn SampleClient,
    mut history: Vec<SampleMessage>,
    tools: Vec<SampleTool>,
    result_schema: Option<Value>,
    executor: Option<LocalToolExecutor>,
) -> McpResult<Value> {
    let mut all_tools = tools;
    let tool_choice = if result_schema.is_some() {
        all_tools.push(final_response_tool(result_schema.as_ref().unwrap()));
        ToolChoice::Required
    } else if all_tools.is_empty() {
        ToolChoice::None
    } else {
        ToolChoice::Auto
    };

    for _ in 0..SAFETY_CAP {
        let step = sample_step(client, history, &all_tools, tool_choice, executor.as_ref(), true).await?;
        history = step.history;

        if let Some(schema) = &result_schema {
            if let Some(call) = step.tool_calls.iter().find(|c| c.name == "final_response") {
                match crate::validate_payload(schema, &call.arguments) {
                    Ok(()) => return Ok(call.arguments.clone()),
                    Err(message) => {
                        history.push(SampleMessage::tool_result(
                            format!("final_response: validation failed: {message}"),
                            true,
                        ));
                        continue;
                    }
                }
            }
            // model didn't call final_response yet; keep looping.
            continue;
        }

        if !step.is_tool_use {
            return Ok(Value::String(step.text.unwrap_or_default()));
        }
    }

    Err(McpError::Protocol("sampling loop exceeded safety cap without terminating".to_string()))
}
