//! # coursefeed
//!
//! `coursefeed` is the live feed backend of an online-course platform. When a
//! course feed post is created or edited, every client currently streaming
//! that course's feed is notified over Server-Sent Events, without polling.
//!
//! ## Core Modules
//!
//! - `feed`: the per-course publish/subscribe bus (registry, fan-out, subscription lifecycle).
//! - `posts`: the event source; stores feed posts and publishes creations and edits.
//! - `transport`: SSE framing and the HTTP routes that relay the bus to clients.
//! - `config`: Handles loading and managing server configuration.
//! - `utils`: Contains shared utilities, such as error handling and logging.

pub mod config;
pub mod feed;
pub mod posts;
pub mod transport;
pub mod utils;

pub use feed::{CancelHandle, FeedBus, FeedEvent, PostKind, PublishReport, Subscription};
pub use utils::error::{Error, Result};
