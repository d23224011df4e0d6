//! Fluent component builders (spec §4.1/§4.2, C2): each wraps a
//! `FunctionDescriptor` plus a callable into a `Registered*` value ready for
//! `LocalProvider::add_*`, deriving input/output schemas the way the
//! execution engine expects them (`mcp_schema::derive_input_schema` /
//! `derive_output_schema`). A consuming-`Self` fluent style rather than
//! introspection of a live function signature, since this core takes an
//! explicit `FunctionDescriptor` instead (spec §4.1).

use mcp_protocol::resource::ResourceSource;
use mcp_protocol::{
    ComponentMeta, McpResult, Prompt, PromptArgument, Resource, ResourceTemplate, TaskConfig, TaskMode, Tool,
    ToolAnnotations,
};
use mcp_schema::{derive_input_schema, derive_output_schema, FunctionDescriptor, ParamType};

use crate::handler::{
    PromptHandler, RegisteredPrompt, RegisteredResource, RegisteredResourceTemplate, RegisteredTool, ResourceHandler,
    ResourceTemplateHandler, ToolHandler,
};
use crate::uri_template::UriTemplate;

/// Builds a `RegisteredTool` from a declared parameter list and a callable.
pub struct ToolBuilder {
    meta: ComponentMeta,
    descriptor: FunctionDescriptor,
    exclude_args: Vec<String>,
    task_config: TaskConfig,
    annotations: Option<ToolAnnotations>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> McpResult<Self> {
        Ok(Self {
            meta: ComponentMeta::new(name).map_err(mcp_protocol::McpError::InvalidComponent)?,
            descriptor: FunctionDescriptor::new(),
            exclude_args: Vec::new(),
            task_config: TaskConfig::default(),
            annotations: None,
        })
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> McpResult<Self> {
        self.meta = self.meta.with_version(version).map_err(mcp_protocol::McpError::InvalidComponent)?;
        Ok(self)
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.meta.tags.insert(tag.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.meta.enabled = enabled;
        self
    }

    /// Declare one parameter. Context-injected parameters (`ParamType::Context`)
    /// are dropped from the derived input schema automatically.
    pub fn param(mut self, param: mcp_schema::ParamDescriptor) -> Self {
        self.descriptor = self.descriptor.with_param(param);
        self
    }

    /// Drop a declared parameter from the wire-visible schema without
    /// marking it context-injected (spec §4.1: satisfied by dependency
    /// injection instead of caller-supplied arguments).
    pub fn exclude_arg(mut self, name: impl Into<String>) -> Self {
        self.exclude_args.push(name.into());
        self
    }

    pub fn returning(mut self, return_type: ParamType) -> Self {
        self.descriptor = self.descriptor.returning(return_type);
        self
    }

    pub fn task_mode(mut self, mode: TaskMode) -> Self {
        self.task_config.mode = mode;
        self
    }

    pub fn task_ttl(mut self, seconds: u64) -> Self {
        self.task_config.ttl = Some(seconds);
        self
    }

    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    pub fn build(self, handler: ToolHandler) -> RegisteredTool {
        let exclude: Vec<&str> = self.exclude_args.iter().map(String::as_str).collect();
        let input_schema = derive_input_schema(&self.descriptor, &exclude);
        let output_schema = self.descriptor.return_type.as_ref().map(|t| derive_output_schema(t).0);

        RegisteredTool {
            descriptor: Tool {
                meta: self.meta,
                input_schema,
                output_schema,
                annotations: self.annotations,
                exclude_args: self.exclude_args,
                task_config: self.task_config,
            },
            handler,
        }
    }
}

/// Builds a `RegisteredResource`: either static content (`text`/`bytes`) or
/// a dynamic handler invoked at read time.
pub struct ResourceBuilder {
    meta: ComponentMeta,
    uri: String,
    mime_type: Option<String>,
}

impl ResourceBuilder {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> McpResult<Self> {
        let uri = uri.into();
        Resource::validate_uri(&uri).map_err(mcp_protocol::McpError::InvalidComponent)?;
        Ok(Self {
            meta: ComponentMeta::new(name).map_err(mcp_protocol::McpError::InvalidComponent)?,
            uri,
            mime_type: None,
        })
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.meta.tags.insert(tag.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> McpResult<Self> {
        self.meta = self.meta.with_version(version).map_err(mcp_protocol::McpError::InvalidComponent)?;
        Ok(self)
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn text(self, content: impl Into<String>) -> RegisteredResource {
        let content = content.into();
        RegisteredResource {
            descriptor: Resource {
                meta: self.meta,
                uri: self.uri,
                mime_type: self.mime_type,
                source: ResourceSource::Text(content.clone()),
            },
            handler: Some(Box::new(move |_ctx| {
                let text = content.clone();
                Box::pin(async move { Ok(crate::handler::ResourceOutput::Text(text)) })
            })),
        }
    }

    pub fn bytes(self, content: Vec<u8>) -> RegisteredResource {
        RegisteredResource {
            descriptor: Resource {
                meta: self.meta,
                uri: self.uri,
                mime_type: self.mime_type,
                source: ResourceSource::Bytes(content.clone()),
            },
            handler: Some(Box::new(move |_ctx| {
                let bytes = content.clone();
                Box::pin(async move { Ok(crate::handler::ResourceOutput::Bytes(bytes)) })
            })),
        }
    }

    pub fn dynamic(self, handler: ResourceHandler) -> RegisteredResource {
        RegisteredResource {
            descriptor: Resource { meta: self.meta, uri: self.uri, mime_type: self.mime_type, source: ResourceSource::Dynamic },
            handler: Some(handler),
        }
    }
}

/// Builds a `RegisteredResourceTemplate` from an RFC 6570-subset URI
/// template pattern (spec §4.5).
pub struct ResourceTemplateBuilder {
    meta: ComponentMeta,
    uri_template: String,
    mime_type: Option<String>,
}

impl ResourceTemplateBuilder {
    pub fn new(uri_template: impl Into<String>, name: impl Into<String>) -> McpResult<Self> {
        let uri_template = uri_template.into();
        UriTemplate::new(&uri_template).map_err(mcp_protocol::McpError::InvalidComponent)?;
        Ok(Self {
            meta: ComponentMeta::new(name).map_err(mcp_protocol::McpError::InvalidComponent)?,
            uri_template,
            mime_type: None,
        })
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn build(self, handler: ResourceTemplateHandler) -> McpResult<RegisteredResourceTemplate> {
        let compiled = UriTemplate::new(&self.uri_template).map_err(mcp_protocol::McpError::InvalidComponent)?;
        Ok(RegisteredResourceTemplate {
            descriptor: ResourceTemplate {
                meta: self.meta,
                uri_template: self.uri_template,
                mime_type: self.mime_type,
                parameters: compiled.variables(),
            },
            handler,
        })
    }
}

/// Builds a `RegisteredPrompt`.
pub struct PromptBuilder {
    meta: ComponentMeta,
    arguments: Vec<PromptArgument>,
}

impl PromptBuilder {
    pub fn new(name: impl Into<String>) -> McpResult<Self> {
        Ok(Self {
            meta: ComponentMeta::new(name).map_err(mcp_protocol::McpError::InvalidComponent)?,
            arguments: Vec::new(),
        })
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> McpResult<Self> {
        self.meta = self.meta.with_version(version).map_err(mcp_protocol::McpError::InvalidComponent)?;
        Ok(self)
    }

    pub fn argument(mut self, name: impl Into<String>, description: Option<String>, required: bool) -> Self {
        self.arguments.push(PromptArgument { name: name.into(), description, required });
        self
    }

    pub fn build(self, handler: PromptHandler) -> RegisteredPrompt {
        RegisteredPrompt { descriptor: Prompt { meta: self.meta, arguments: self.arguments }, handler }
    }
}
