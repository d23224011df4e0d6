//! Schema derivation, `$ref`/`$defs` compression, and argument
//! coercion/validation for MCP tool, resource, and prompt parameters.
//!
//! A `JsonSchema` in this crate is just a `serde_json::Value` — there is no
//! closed Rust enum for "a schema". Schemas here are built from descriptors
//! at registration time (the framework never introspects a live function
//! signature the way the Python original does; the builder API supplies a
//! `FunctionDescriptor` instead) and from OpenAPI/host documents at runtime,
//! and they need to carry `$ref`/`$defs`/`anyOf` shapes a closed enum can't
//! express without becoming a second, parallel JSON Schema implementation.

mod coerce;
mod descriptor;
mod refs;

pub use coerce::{validate_and_coerce, CoerceError};
pub use descriptor::{
    derive_input_schema, derive_output_schema, FunctionDescriptor, ParamDescriptor, ParamType,
};
pub use refs::compress_refs;

/// The key the execution engine and clients look for to know an output
/// schema wraps a non-object return value (spec §4.1: "Primitives,
/// sequences, and mappings... are wrapped with a single `result` property").
pub const WRAP_RESULT_MARKER: &str = "x-fastmcp-wrap-result";
