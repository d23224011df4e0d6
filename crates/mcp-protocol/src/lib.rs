//! Data model for the Model Context Protocol core.
//!
//! This crate defines the wire-independent types shared by every layer of
//! the framework: components (tools, resources, resource templates,
//! prompts), the content blocks a component invocation produces, tasks, and
//! the unified error taxonomy. Nothing here performs I/O or makes a
//! scheduling decision — see `mcp-server` for that.

pub mod capabilities;
pub mod component;
pub mod content;
pub mod error;
pub mod key;
pub mod prompt;
pub mod resource;
pub mod task;
pub mod tool;
pub mod version;

pub use capabilities::{
    ClientCapabilities, ExperimentalCapabilities, Implementation, ListChangedCapability, RootsCapability,
    ServerCapabilities,
};
pub use component::ComponentMeta;
pub use content::{ContentBlock, PromptMessage, ResourceContent, Role, ToolResult};
pub use error::{McpError, McpResult};
pub use key::{Key, Kind};
pub use prompt::{Prompt, PromptArgument};
pub use resource::{Resource, ResourceTemplate};
pub use task::{Task, TaskState};
pub use tool::{Tool, ToolAnnotations, TaskConfig, TaskMode};
pub use version::VersionSpec;
