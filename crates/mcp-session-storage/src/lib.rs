//! Session-scoped key/value state store (spec §4.10, C10).
//!
//! A `StateStore` is the one user-visible mutable shared resource the core
//! defines (spec §5: "the state store is the only user-visible mutable
//! shared resource"). It backs both user-placed session state (`Context::
//! get_state`/`set_state`) and the built-in session visibility rules that
//! the transform layer applies on every list/get.

mod memory;
mod session;
mod store;

pub use memory::InMemoryStateStore;
pub use session::{derive_session_id, SessionId};
pub use store::{session_key, StateStore, StateStoreError};

/// Default TTL for user-placed session state (spec §4.10): one day.
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
