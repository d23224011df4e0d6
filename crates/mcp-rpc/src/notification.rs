use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::RequestParams;

/// A JSON-RPC notification: a request with no `id` and therefore no
/// response (spec §6: `*/listChanged`, `progress`, `log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self { version: crate::JSONRPC_VERSION.to_string(), method: method.into(), params }
    }

    pub fn list_changed(kind: &str) -> Self {
        Self::new(format!("notifications/{kind}/list_changed"), None)
    }

    pub fn progress(token: Value, progress: f64, total: Option<f64>, message: Option<String>) -> Self {
        let mut map = std::collections::HashMap::new();
        map.insert("progressToken".to_string(), token);
        map.insert("progress".to_string(), serde_json::json!(progress));
        if let Some(total) = total {
            map.insert("total".to_string(), serde_json::json!(total));
        }
        if let Some(message) = message {
            map.insert("message".to_string(), Value::String(message));
        }
        Self::new("notifications/progress", Some(RequestParams::Object(map)))
    }

    pub fn log(level: &str, logger: Option<&str>, data: Value) -> Self {
        let mut map = std::collections::HashMap::new();
        map.insert("level".to_string(), Value::String(level.to_string()));
        if let Some(logger) = logger {
            map.insert("logger".to_string(), Value::String(logger.to_string()));
        }
        map.insert("data".to_string(), data);
        Self::new("notifications/message", Some(RequestParams::Object(map)))
    }
}
