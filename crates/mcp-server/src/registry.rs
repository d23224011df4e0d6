//! The local component registry (spec §4.2, C4): tables keyed by
//! `(kind, name, version)` with a secondary bare-name index for "default =
//! highest version", plus URI/URI-template indexes for resources.

use std::collections::HashMap;

use mcp_protocol::{Key, Kind, McpError, McpResult, VersionSpec};

use crate::handler::{RegisteredPrompt, RegisteredResource, RegisteredResourceTemplate, RegisteredTool};
use crate::uri_template::UriTemplate;

/// Collision behavior on re-registration of the same `(kind, name,
/// version)` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Warn,
    Error,
    Replace,
    Ignore,
}

impl DuplicatePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "replace" => Some(Self::Replace),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

struct NameVersions {
    versions: Vec<String>,
}

impl NameVersions {
    fn new() -> Self {
        Self { versions: Vec::new() }
    }

    fn is_versioned(&self) -> bool {
        self.versions.iter().any(|v| !v.is_empty())
    }

    fn is_unversioned(&self) -> bool {
        self.versions.iter().any(|v| v.is_empty())
    }
}

/// Always present, always first in a server's provider chain (spec §4.2).
#[derive(Default)]
pub struct LocalProvider {
    policy: DuplicatePolicy,
    tools: HashMap<Key, RegisteredTool>,
    resources: HashMap<Key, RegisteredResource>,
    templates: HashMap<Key, RegisteredResourceTemplate>,
    prompts: HashMap<Key, RegisteredPrompt>,
    /// `(kind, name) -> known versions`, used to pick the highest version
    /// for an unqualified lookup and to reject version-mixing.
    names: HashMap<(Kind, String), NameVersions>,
    /// Registration-order URI index for concrete resources.
    resource_order: Vec<String>,
    /// Registration-order index for templates, matched in this order after
    /// concrete resources fail to match (spec §4.5).
    template_order: Vec<(Key, UriTemplate)>,
}

impl LocalProvider {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy, ..Default::default() }
    }

    fn check_and_record_version(&mut self, kind: Kind, name: &str, version: &str) -> McpResult<bool> {
        let entry = self.names.entry((kind, name.to_string())).or_insert_with(NameVersions::new);
        let already_present = entry.versions.iter().any(|v| v == version);

        if !already_present {
            let mixing = (version.is_empty() && entry.is_versioned())
                || (!version.is_empty() && entry.is_unversioned());
            if mixing {
                return Err(McpError::DuplicateComponent(format!(
                    "cannot mix versioned and unversioned registrations for {kind} '{name}'"
                )));
            }
        }
        Ok(already_present)
    }

    fn resolve_action(&self, duplicate: bool) -> Action {
        if !duplicate {
            return Action::Insert;
        }
        match self.policy {
            DuplicatePolicy::Warn => {
                tracing::warn!("duplicate registration replaced under 'warn' policy");
                Action::Insert
            }
            DuplicatePolicy::Error => Action::Error,
            DuplicatePolicy::Replace => Action::Insert,
            DuplicatePolicy::Ignore => Action::Skip,
        }
    }

    pub fn add_tool(&mut self, registered: RegisteredTool) -> McpResult<()> {
        let key = registered.descriptor.key();
        let duplicate = self.tools.contains_key(&key);
        self.check_and_record_version(key.kind, &key.name, &key.version)?;
        match self.resolve_action(duplicate) {
            Action::Error => Err(McpError::DuplicateComponent(key.to_string())),
            Action::Skip => Ok(()),
            Action::Insert => {
                if !duplicate {
                    self.names.get_mut(&(key.kind, key.name.clone())).unwrap().versions.push(key.version.clone());
                }
                self.tools.insert(key, registered);
                Ok(())
            }
        }
    }

    pub fn add_resource(&mut self, registered: RegisteredResource) -> McpResult<()> {
        let key = registered.descriptor.key();
        let duplicate = self.resources.contains_key(&key);
        self.check_and_record_version(key.kind, &key.name, &key.version)?;
        match self.resolve_action(duplicate) {
            Action::Error => Err(McpError::DuplicateComponent(key.to_string())),
            Action::Skip => Ok(()),
            Action::Insert => {
                if !duplicate {
                    self.names.get_mut(&(key.kind, key.name.clone())).unwrap().versions.push(key.version.clone());
                    self.resource_order.push(registered.descriptor.uri.clone());
                }
                self.resources.insert(key, registered);
                Ok(())
            }
        }
    }

    pub fn add_resource_template(&mut self, registered: RegisteredResourceTemplate) -> McpResult<()> {
        let key = registered.descriptor.key();
        let duplicate = self.templates.contains_key(&key);
        self.check_and_record_version(key.kind, &key.name, &key.version)?;
        match self.resolve_action(duplicate) {
            Action::Error => Err(McpError::DuplicateComponent(key.to_string())),
            Action::Skip => Ok(()),
            Action::Insert => {
                if !duplicate {
                    self.names.get_mut(&(key.kind, key.name.clone())).unwrap().versions.push(key.version.clone());
                    let compiled = UriTemplate::new(&registered.descriptor.uri_template)
                        .map_err(McpError::InvalidComponent)?;
                    self.template_order.push((key.clone(), compiled));
                }
                self.templates.insert(key, registered);
                Ok(())
            }
        }
    }

    pub fn add_prompt(&mut self, registered: RegisteredPrompt) -> McpResult<()> {
        let key = registered.descriptor.key();
        let duplicate = self.prompts.contains_key(&key);
        self.check_and_record_version(key.kind, &key.name, &key.version)?;
        match self.resolve_action(duplicate) {
            Action::Error => Err(McpError::DuplicateComponent(key.to_string())),
            Action::Skip => Ok(()),
            Action::Insert => {
                if !duplicate {
                    self.names.get_mut(&(key.kind, key.name.clone())).unwrap().versions.push(key.version.clone());
                }
                self.prompts.insert(key, registered);
                Ok(())
            }
        }
    }

    /// Resolve a bare name + optional `VersionSpec` to the concrete key
    /// that should be looked up: the exact version if `spec.eq` is set,
    /// otherwise the highest version matching `spec` (spec §4.2, §4.3).
    fn resolve_key(&self, kind: Kind, name: &str, spec: Option<&VersionSpec>) -> Option<Key> {
        let versions = &self.names.get(&(kind, name.to_string()))?.versions;
        let spec = spec.cloned().unwrap_or_default();
        let matching: Vec<&str> = versions.iter().map(String::as_str).filter(|v| spec.matches(v)).collect();
        let highest = mcp_protocol::version::highest_version(matching)?;
        Some(Key::new(kind, name, if highest.is_empty() { None } else { Some(highest) }))
    }

    pub fn get_tool(&self, name: &str, spec: Option<&VersionSpec>) -> Option<&RegisteredTool> {
        let key = self.resolve_key(Kind::Tool, name, spec)?;
        self.tools.get(&key)
    }

    pub fn list_tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.values()
    }

    pub fn get_resource(&self, uri: &str) -> Option<&RegisteredResource> {
        self.resources.values().find(|r| r.descriptor.uri == uri)
    }

    pub fn list_resources(&self) -> impl Iterator<Item = &RegisteredResource> {
        self.resources.values()
    }

    /// Match `uri` against templates in registration order; first match
    /// wins (spec §4.5: "a broad wildcard template registered before a
    /// specific one shadows it").
    pub fn match_resource_template(
        &self,
        uri: &str,
    ) -> Option<(&RegisteredResourceTemplate, HashMap<String, String>)> {
        for (key, template) in &self.template_order {
            if let Some(vars) = template.matches(uri) {
                return self.templates.get(key).map(|t| (t, vars));
            }
        }
        None
    }

    pub fn list_resource_templates(&self) -> impl Iterator<Item = &RegisteredResourceTemplate> {
        self.templates.values()
    }

    pub fn get_prompt(&self, name: &str, spec: Option<&VersionSpec>) -> Option<&RegisteredPrompt> {
        let key = self.resolve_key(Kind::Prompt, name, spec)?;
        self.prompts.get(&key)
    }

    pub fn list_prompts(&self) -> impl Iterator<Item = &RegisteredPrompt> {
        self.prompts.values()
    }
}

enum Action {
    Insert,
    Skip,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, ToolOutput};
    use mcp_protocol::{ComponentMeta, McpResult as Res, Tool};
    use serde_json::json;

    fn tool(name: &str, version: Option<&str>) -> RegisteredTool {
        let mut meta = ComponentMeta::new(name).unwrap();
        if let Some(v) = version {
            meta = meta.with_version(v).unwrap();
        }
        RegisteredTool {
            descriptor: Tool {
                meta,
                input_schema: json!({"type": "object", "properties": {}}),
                output_schema: None,
                annotations: None,
                exclude_args: vec![],
                task_config: Default::default(),
            },
            handler: Box::new(|_args, _ctx| -> BoxFuture<'static, Res<ToolOutput>> {
                Box::pin(async { Ok(ToolOutput::text("ok")) })
            }),
        }
    }

    #[test]
    fn get_without_version_returns_highest() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_tool(tool("add", Some("1.0"))).unwrap();
        registry.add_tool(tool("add", Some("2.0"))).unwrap();
        let found = registry.get_tool("add", None).unwrap();
        assert_eq!(found.descriptor.meta.version_str(), "2.0");
    }

    #[test]
    fn mixing_versioned_and_unversioned_under_same_name_errors() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_tool(tool("add", None)).unwrap();
        let err = registry.add_tool(tool("add", Some("1.0"))).unwrap_err();
        assert!(matches!(err, McpError::DuplicateComponent(_)));
    }

    #[test]
    fn error_policy_rejects_duplicate_registration() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Error);
        registry.add_tool(tool("add", Some("1.0"))).unwrap();
        let err = registry.add_tool(tool("add", Some("1.0"))).unwrap_err();
        assert!(matches!(err, McpError::DuplicateComponent(_)));
    }

    #[test]
    fn ignore_policy_keeps_first_registration() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Ignore);
        registry.add_tool(tool("add", Some("1.0"))).unwrap();
        registry.add_tool(tool("add", Some("1.0"))).unwrap();
        assert_eq!(registry.list_tools().count(), 1);
    }

    #[test]
    fn exact_version_spec_resolves_that_version_only() {
        let mut registry = LocalProvider::new(DuplicatePolicy::Warn);
        registry.add_tool(tool("add", Some("1.0"))).unwrap();
        registry.add_tool(tool("add", Some("2.0"))).unwrap();
        let spec = VersionSpec::exact("1.0");
        let found = registry.get_tool("add", Some(&spec)).unwrap();
        assert_eq!(found.descriptor.meta.version_str(), "1.0");
    }
}
