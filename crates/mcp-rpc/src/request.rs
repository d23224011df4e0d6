use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC request id: string or number, never null for a request that
/// expects a response (notifications carry no id at all, see
/// `JsonRpcNotification`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC params, either positional or named. MCP methods always use
/// named params, but both forms are legal on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestParams {
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl RequestParams {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }
}

impl From<HashMap<String, Value>> for RequestParams {
    fn from(map: HashMap<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self { version: crate::JSONRPC_VERSION.to_string(), id, method: method.into(), params }
    }

    /// Per-request version selection (spec §6): a `version` field under
    /// request `meta`, not among the tool arguments.
    pub fn version_spec_hint(&self) -> Option<String> {
        self.params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|meta| meta.get("version"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Task metadata under `_meta.task` (spec §4.11): presence signals the
    /// caller wants this call backgrounded.
    pub fn task_meta(&self) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get("_meta")).and_then(|meta| meta.get("task"))
    }
}
