//! Shared utilities: the crate error type and logging set-up.

pub mod error;
pub mod logging;
