//! prompt-relay: streaming relay for chat completions.
//!
//! Accepts a conversation over HTTP, forwards it to an OpenAI-compatible
//! chat completions API with streaming enabled, and writes the generated
//! text back to the caller fragment by fragment as it arrives.

pub mod config;
pub mod error;
pub mod relay;
pub mod server;
