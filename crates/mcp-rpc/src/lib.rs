//! JSON-RPC 2.0 envelope types for the MCP wire protocol (spec §6).
//!
//! This crate only models the request/response/notification/error
//! *envelope* — the decoded shape a transport hands the dispatcher and the
//! shape the dispatcher hands back. Framing (how bytes become one of these
//! values, over stdio/SSE/HTTP) is a named out-of-scope collaborator (spec
//! §1); nothing here touches a socket.

mod error;
mod notification;
mod request;
mod response;

pub use error::{codes, JsonRpcError};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestId, RequestParams};
pub use response::{JsonRpcOutcome, JsonRpcResponse};

pub const JSONRPC_VERSION: &str = "2.0";
