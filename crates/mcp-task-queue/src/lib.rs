//! Durable task queue abstraction (spec §4.11, C11 — queue half).
//!
//! The queue is a named out-of-scope collaborator in spec §1: "the durable
//! queue's actual persistence engine" is someone else's problem (SQLite,
//! DynamoDB, NATS JetStream, or any other durable backend). What this crate
//! owns is the contract the execution engine submits work through and the
//! worker loop polls results from, plus one in-memory implementation for
//! tests and small deployments.

mod memory;
mod queue;

pub use memory::InMemoryTaskQueue;
pub use queue::{QueuedTask, TaskQueue, TaskQueueError};
