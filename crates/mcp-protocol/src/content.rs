//! Content blocks and the result/message sum types built from them
//! (spec §3, "ToolResult / ResourceContent / PromptMessage").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single piece of content returned by a tool, resource, or prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded image bytes.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        /// Base64-encoded audio bytes.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Embedded binary resource: a URI plus its declared MIME type, used
    /// when `bytes` returned from a tool is not valid UTF-8 (spec §4.9).
    #[serde(rename = "resource")]
    EmbeddedResource {
        uri: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Base64-encoded bytes.
        blob: String,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    /// Adjacent plain-text blocks in a normalized list collapse into one
    /// (spec §4.9); structured/image/audio/embedded blocks never merge.
    pub fn is_mergeable_text(&self) -> bool {
        matches!(self, ContentBlock::Text { .. })
    }
}

/// Speaker role for a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// The outcome of a `tools/call` (or, when backgrounded, the payload stored
/// for `tasks/result`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self { content, structured_content: None, is_error: false }
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    /// A failed call: text content describing the failure, no structured
    /// content (spec §7: "a failed tool call returns
    /// `{content: [text(<error message>)], isError: true}` with no
    /// `structuredContent`").
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            structured_content: None,
            is_error: true,
        }
    }
}

/// The result of a resource read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

/// A single rendered prompt message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: ContentBlock,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: ContentBlock::text(text) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: ContentBlock::text(text) }
    }
}
