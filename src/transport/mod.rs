//! The `transport` module relays the feed bus to HTTP clients.
//!
//! - `sse`: the Server-Sent Events wire format of a feed stream
//! - `http`: axum routes and the server loop

pub mod http;
pub mod sse;

pub use http::{AppState, router, serve};

#[cfg(test)]
mod tests;
