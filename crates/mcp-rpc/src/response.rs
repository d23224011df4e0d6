use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcError;
use crate::request::RequestId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: JsonRpcOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcOutcome {
    Result { result: Value },
    Error { error: JsonRpcError },
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { version: crate::JSONRPC_VERSION.to_string(), id, outcome: JsonRpcOutcome::Result { result } }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self { version: crate::JSONRPC_VERSION.to_string(), id, outcome: JsonRpcOutcome::Error { error } }
    }
}
