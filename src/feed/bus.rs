//! Feed bus
//!
//! `FeedBus` ties the registry, the dispatcher and subscription lifecycle
//! together. It is constructed once at start-up, cloned into every
//! collaborator that publishes or streams, and shut down explicitly.
//!
//! Concurrency and usage notes:
//! - `publish` is synchronous and never blocks on a subscriber; it may be
//!   called from any task or thread, including while subscriptions on the
//!   same topic are being opened or cancelled.
//! - `subscribe` hands back the read side of a fresh queue plus a cancel
//!   handle. Nothing published before the call is ever replayed.
//! - `shutdown` ends every subscription and refuses new ones.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::feed::dispatcher::{Dispatcher, PublishReport};
use crate::feed::event::FeedEvent;
use crate::feed::registry::TopicRegistry;
use crate::feed::subscriber::{CancelHandle, SubscriberId, Subscription};
use crate::utils::error::{Error, Result};

#[derive(Debug)]
struct Inner {
    registry: Arc<TopicRegistry>,
    dispatcher: Dispatcher,
    capacity: usize,
    shutdown: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct FeedBus {
    inner: Arc<Inner>,
}

impl Default for FeedBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl FeedBus {
    /// Pending events a subscriber may hold before new ones are dropped.
    pub const DEFAULT_CAPACITY: usize = 10;

    /// Creates a bus whose subscribers each buffer up to `capacity` events
    /// (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let registry = Arc::new(TopicRegistry::new());
        Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(Arc::clone(&registry)),
                registry,
                capacity: capacity.max(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.registry.subscriber_count(topic)
    }

    /// Number of topics with at least one live subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.registry.topic_count()
    }

    pub fn is_subscribed(&self, topic: &str, id: &SubscriberId) -> bool {
        self.inner.registry.contains(topic, id)
    }

    /// Opens a new subscription on `topic`.
    ///
    /// Fails only once the bus has been shut down. The shutdown check is
    /// repeated under the registry lock, so a subscribe racing with
    /// `shutdown` is either refused or removed by it.
    pub fn subscribe(&self, topic: &str) -> Result<(Subscription, CancelHandle)> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        Subscription::open(
            topic,
            self.inner.capacity,
            Arc::clone(&self.inner.registry),
            self.inner.shutdown.child_token(),
        )
    }

    /// Fire-and-forget fan-out of `event` to the current subscribers of `topic`.
    pub fn publish(&self, topic: &str, event: FeedEvent) -> PublishReport {
        self.inner.dispatcher.publish(topic, event)
    }

    /// Ends every subscription and rejects further `subscribe` calls.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        let removed = self.inner.registry.clear();
        info!(subscribers = removed, "feed bus shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Resolves once `shutdown` has been called.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }
}
