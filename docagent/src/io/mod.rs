//! Side effects: model backends, state files and archive export.

pub mod archive;
pub mod backend;
pub mod config;
pub mod gemini;
pub mod openrouter;
pub mod paths;
pub mod settings;
