//! The `error` module defines the error type shared across `coursefeed`.
//!
//! Publishing on the feed bus is infallible by construction, so nothing here
//! describes a delivery failure. Errors come from stream setup after
//! shutdown, the post collaborator, serialization and start-up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The feed bus has been shut down and accepts no new subscriptions.
    #[error("feed bus is shutting down")]
    ShuttingDown,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
