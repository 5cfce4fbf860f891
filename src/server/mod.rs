//! HTTP surface of the relay.
//!
//! - [`api`]: application state, router and route handlers
//! - [`streaming`]: outbound event-stream response construction

pub mod api;
pub mod streaming;
