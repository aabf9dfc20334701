//! Conversational documentation agent.
//!
//! A language model fills a tree of project documentation through a streamed
//! protocol: chat text, a separator, then one JSON payload carrying the new
//! reasoning schema, an optional file edit and a continuation flag.
//!
//! - **[`core`]**: Pure, deterministic logic (tree edits, protocol parsing,
//!   SSE decoding, the session reducer). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP backends, state files, zip
//!   export). Isolated behind traits to enable scripted backends in tests.
//!
//! Orchestration modules ([`cycle`], [`controller`]) coordinate core logic
//! with I/O to run agent cycles and the autonomous continuation loop.

pub mod controller;
pub mod core;
pub mod cycle;
pub mod io;
pub mod logging;
pub mod prompt;
pub mod reasoning;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
