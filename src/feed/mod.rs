//! Live feed event bus
//!
//! Per-course, in-process publish/subscribe used to push "a feed post was
//! created or changed" notifications to every open feed stream.
//!
//! - `event`: the `FeedEvent` payload
//! - `subscriber`: one bounded queue per stream, with its cancel handle
//! - `registry`: topic -> live subscriber queues
//! - `dispatcher`: non-blocking fan-out with drop-newest overflow
//! - `bus`: `FeedBus`, the entry point that owns all of the above
//!
//! Delivery is at-most-once: no persistence, no replay for late subscribers,
//! and FIFO only within one topic for one subscriber.

pub mod bus;
pub(crate) mod dispatcher;
pub mod event;
pub(crate) mod registry;
pub mod subscriber;

pub use bus::FeedBus;
pub use dispatcher::PublishReport;
pub use event::{FeedEvent, PostKind};
pub use subscriber::{CancelHandle, SubscriberId, SubscriberState, Subscription};
