use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{StateStore, StateStoreError};

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-memory `StateStore`: an `Arc<RwLock<HashMap<...>>>` over arbitrary
/// key/value state rather than whole session records.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    fn prune_expired(&self, now: Instant) {
        let mut entries = self.entries.write().expect("state store lock poisoned");
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StateStoreError> {
        let mut entries = self.entries.write().expect("state store lock poisoned");
        entries.insert(key.to_string(), Entry { value, expires_at: Instant::now() + ttl });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        let now = Instant::now();
        self.prune_expired(now);
        let entries = self.entries.read().expect("state store lock poisoned");
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        let mut entries = self.entries.write().expect("state store lock poisoned");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryStateStore::new();
        store.put("sess:key", json!({"a": 1}), Duration::from_secs(60)).await.unwrap();
        let value = store.get("sess:key").await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let store = InMemoryStateStore::new();
        store.put("sess:key", json!(1), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let value = store.get("sess:key").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryStateStore::new();
        store.put("sess:key", json!(1), Duration::from_secs(60)).await.unwrap();
        store.delete("sess:key").await.unwrap();
        assert_eq!(store.get("sess:key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_are_isolated_by_caller_supplied_prefix() {
        let store = InMemoryStateStore::new();
        store.put(&crate::store::session_key("s1", "k"), json!("one"), Duration::from_secs(60)).await.unwrap();
        store.put(&crate::store::session_key("s2", "k"), json!("two"), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&crate::store::session_key("s1", "k")).await.unwrap(), Some(json!("one")));
        assert_eq!(store.get(&crate::store::session_key("s2", "k")).await.unwrap(), Some(json!("two")));
    }
}
