//! The streaming relay.
//!
//! - [`types`]: conversation turns, inbound/outbound request bodies, upstream events
//! - [`decoder`]: incremental line framing and `data:` event classification
//! - [`upstream`]: the upstream completion source and its reqwest client
//! - [`stream`]: the relay state machine turning upstream bytes into outbound text
//! - [`service`]: request handling from validation to a primed outbound stream

pub mod decoder;
pub mod service;
pub mod stream;
pub mod types;
pub mod upstream;
