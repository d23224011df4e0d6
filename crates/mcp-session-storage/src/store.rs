use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("state store backend error: {0}")]
    Backend(String),
}

/// `put(key, value, ttl) / get(key) / delete(key)` (spec §4.10). Keys are
/// always passed already prefixed with the owning session id — this trait
/// itself knows nothing about sessions, only about expiring key/value pairs.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StateStoreError>;
    async fn get(&self, key: &str) -> Result<Option<Value>, StateStoreError>;
    async fn delete(&self, key: &str) -> Result<(), StateStoreError>;
}

/// Prefix a bare key with its owning session id, isolating state across
/// sessions sharing one store (spec §4.10: "session state keys are
/// prefixed with the session id so multiple sessions are isolated").
pub fn session_key(session_id: &str, key: &str) -> String {
    format!("{session_id}:{key}")
}
