//! Subscriber channel
//!
//! One `Subscription` exists per open feed stream. It owns the receive end
//! of a bounded queue; the matching sender lives in the `TopicRegistry`
//! until the subscription terminates.
//!
//! Termination happens exactly once, whichever trigger comes first:
//! - `CancelHandle::cancel`
//! - the `Subscription` being dropped (the transport's request went away)
//! - bus shutdown (the bus-wide token is the parent of every subscription token)
//!
//! Drain policy: once terminated, `recv` returns `None` straight away and
//! any events still queued are discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::feed::event::FeedEvent;
use crate::feed::registry::TopicRegistry;
use crate::utils::error::{Error, Result};

pub type SubscriberId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connected,
    Closed,
}

/// Shared between a `Subscription` and its `CancelHandle`s; ends the
/// registration at most once.
#[derive(Debug)]
struct Lease {
    id: SubscriberId,
    topic: String,
    registry: Arc<TopicRegistry>,
    token: CancellationToken,
    ended: AtomicBool,
}

impl Lease {
    /// Returns `true` only for the call that actually ended the subscription.
    /// A subscription already ended by bus shutdown reports `false`.
    fn end(&self) -> bool {
        // only the parent can have cancelled the token before the swap
        let shut_down = self.token.is_cancelled();
        if self.ended.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        self.registry.unregister(&self.topic, &self.id);
        if shut_down {
            return false;
        }
        debug!(topic = %self.topic, subscriber = %self.id, "subscription ended");
        true
    }

    fn is_terminated(&self) -> bool {
        self.ended.load(Ordering::Acquire) || self.token.is_cancelled()
    }
}

/// Read handle of one feed stream.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Arc<FeedEvent>>,
    lease: Arc<Lease>,
    capacity: usize,
}

/// Ends a subscription from anywhere. Cloneable; cancelling twice is a no-op.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    lease: Arc<Lease>,
}

impl Subscription {
    /// Creates a queue of `capacity` slots and registers it under `topic`.
    ///
    /// `token` should be a child of the bus shutdown token. Fails with
    /// `ShuttingDown` when it is already cancelled at registration time.
    pub(crate) fn open(
        topic: &str,
        capacity: usize,
        registry: Arc<TopicRegistry>,
        token: CancellationToken,
    ) -> Result<(Self, CancelHandle)> {
        let capacity = capacity.max(1);
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity);
        if !registry.register(topic, id, tx, &token) {
            return Err(Error::ShuttingDown);
        }
        debug!(topic, subscriber = %id, capacity, "subscription opened");

        let lease = Arc::new(Lease {
            id,
            topic: topic.to_string(),
            registry,
            token,
            ended: AtomicBool::new(false),
        });
        let handle = CancelHandle {
            lease: Arc::clone(&lease),
        };
        Ok((
            Self {
                receiver: rx,
                lease,
                capacity,
            },
            handle,
        ))
    }

    pub fn id(&self) -> SubscriberId {
        self.lease.id
    }

    pub fn topic(&self) -> &str {
        &self.lease.topic
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> SubscriberState {
        if self.lease.is_terminated() {
            SubscriberState::Closed
        } else {
            SubscriberState::Connected
        }
    }

    /// Number of events queued and not yet read.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            lease: Arc::clone(&self.lease),
        }
    }

    /// Waits for the next event or for termination, whichever comes first.
    ///
    /// Returns `None` once the subscription is closed, and on every call after.
    pub async fn recv(&mut self) -> Option<Arc<FeedEvent>> {
        if self.lease.is_terminated() {
            self.close();
            return None;
        }

        tokio::select! {
            biased;
            () = self.lease.token.cancelled() => {
                self.close();
                None
            }
            event = self.receiver.recv() => match event {
                Some(event) => Some(event),
                None => {
                    self.close();
                    None
                }
            },
        }
    }

    /// Non-blocking read. `None` when the queue is empty or the subscription is closed.
    pub fn try_recv(&mut self) -> Option<Arc<FeedEvent>> {
        if self.lease.is_terminated() {
            self.close();
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Turns the subscription into a stream that ends on termination.
    /// Dropping the stream ends the subscription.
    pub fn into_stream(self) -> impl Stream<Item = Arc<FeedEvent>> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.recv().await?;
            Some((event, subscription))
        })
    }

    fn close(&mut self) {
        self.lease.end();
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.lease.end();
    }
}

impl CancelHandle {
    pub fn id(&self) -> SubscriberId {
        self.lease.id
    }

    pub fn topic(&self) -> &str {
        &self.lease.topic
    }

    /// Ends the subscription. Returns `false` if it had already ended.
    pub fn cancel(&self) -> bool {
        self.lease.end()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lease.is_terminated()
    }
}
