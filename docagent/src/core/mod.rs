//! Deterministic, pure logic for the agent cycle.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod modes;
pub mod path;
pub mod protocol;
pub mod session;
pub mod sse;
pub mod tree_update;
pub mod types;
