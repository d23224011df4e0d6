//! Shared base attributes for every component kind (spec §3).

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::key::{Key, Kind};

/// Attributes common to `Tool`, `Resource`, `ResourceTemplate`, and
/// `Prompt`. Each concrete component embeds one of these and derives its
/// `key()` from it plus its own `Kind`.
#[derive(Debug, Clone)]
pub struct ComponentMeta {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: HashSet<String>,
    pub enabled: bool,
    /// Raw version string, validated to exclude `@` at construction time.
    pub version: Option<String>,
    pub meta: HashMap<String, Value>,
}

impl ComponentMeta {
    /// Construct, rejecting an empty name or a version containing `@`
    /// (spec §3: "validated to exclude `@`").
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.is_empty() {
            return Err("component name must not be empty".to_string());
        }
        Ok(Self {
            name,
            title: None,
            description: None,
            tags: HashSet::new(),
            enabled: true,
            version: None,
            meta: HashMap::new(),
        })
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Result<Self, String> {
        let version = version.into();
        if version.contains('@') {
            return Err(format!("version '{version}' must not contain '@'"));
        }
        self.version = Some(version);
        Ok(self)
    }

    pub fn key(&self, kind: Kind) -> Key {
        Key::new(kind, self.name.clone(), self.version.as_deref())
    }

    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(ComponentMeta::new("").is_err());
    }

    #[test]
    fn rejects_version_with_at_sign() {
        let meta = ComponentMeta::new("tool").unwrap();
        assert!(meta.with_version("1.0@beta").is_err());
    }

    #[test]
    fn key_uses_empty_sentinel_when_unversioned() {
        let meta = ComponentMeta::new("echo").unwrap();
        assert_eq!(meta.key(Kind::Tool).to_string(), "tool:echo@");
    }
}
