//! Initialize-time capability negotiation types (spec §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// Capabilities the client advertises at `initialize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default)]
    pub roots: Option<RootsCapability>,
    #[serde(default)]
    pub sampling: Option<serde_json::Value>,
    #[serde(default)]
    pub elicitation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootsCapability {
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// Capabilities the server advertises at `initialize` (spec §6): list-changed
/// notifications per kind, plus the experimental `tasks` capability when any
/// registered component declares a non-forbidden task mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<ListChangedCapability>,
    #[serde(default)]
    pub resources: Option<ListChangedCapability>,
    #[serde(default)]
    pub prompts: Option<ListChangedCapability>,
    #[serde(default)]
    pub logging: Option<serde_json::Value>,
    #[serde(default)]
    pub experimental: Option<ExperimentalCapabilities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListChangedCapability {
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentalCapabilities {
    #[serde(default)]
    pub task: bool,
}
