//! Resource and resource-template descriptors (spec §3).

use crate::component::ComponentMeta;
use crate::key::Kind;

/// Eager or lazy resource content, the data half of a `Resource` — the
/// callable form is attached by `mcp-server`.
#[derive(Debug, Clone)]
pub enum ResourceSource {
    Text(String),
    Bytes(Vec<u8>),
    /// Resolved by invoking the registered callable at read time.
    Dynamic,
}

/// A resource: addressable content identified by a concrete URI.
#[derive(Debug, Clone)]
pub struct Resource {
    pub meta: ComponentMeta,
    pub uri: String,
    pub mime_type: Option<String>,
    pub source: ResourceSource,
}

impl Resource {
    /// Validate that `uri` has both a scheme and a path (spec §3 invariant).
    pub fn validate_uri(uri: &str) -> Result<(), String> {
        let parsed = url::Url::parse(uri).map_err(|e| format!("invalid resource URI '{uri}': {e}"))?;
        if parsed.scheme().is_empty() {
            return Err(format!("resource URI '{uri}' is missing a scheme"));
        }
        if parsed.path().is_empty() {
            return Err(format!("resource URI '{uri}' is missing a path"));
        }
        Ok(())
    }

    pub fn key(&self) -> crate::key::Key {
        self.meta.key(Kind::Resource)
    }
}

/// A resource template: a URI pattern (RFC 6570 subset, spec §4.5) whose
/// concrete parameters are bound at read time.
#[derive(Debug, Clone)]
pub struct ResourceTemplate {
    pub meta: ComponentMeta,
    pub uri_template: String,
    pub mime_type: Option<String>,
    /// Parameter names extracted from `uri_template`, in order of
    /// appearance.
    pub parameters: Vec<String>,
}

impl ResourceTemplate {
    pub fn key(&self) -> crate::key::Key {
        self.meta.key(Kind::ResourceTemplate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_uri_without_scheme() {
        assert!(Resource::validate_uri("no-scheme-here").is_err());
    }

    #[test]
    fn accepts_well_formed_uri() {
        assert!(Resource::validate_uri("users://42/profile").is_ok());
    }
}
