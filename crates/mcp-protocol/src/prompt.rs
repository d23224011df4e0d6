//! Prompt descriptor (spec §3, "Prompt").

use crate::component::ComponentMeta;
use crate::key::Kind;

#[derive(Debug, Clone)]
pub struct PromptArgument {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

/// A prompt: a parameterized message generator. The rendering callable is
/// attached by `mcp-server`.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub meta: ComponentMeta,
    pub arguments: Vec<PromptArgument>,
}

impl Prompt {
    pub fn key(&self) -> crate::key::Key {
        self.meta.key(Kind::Prompt)
    }
}
