//! Broadcast dispatcher
//!
//! Fans one event out to every subscriber registered on a topic at the
//! moment `publish` is called. Publishing runs on the caller's thread and
//! never waits: each enqueue is a `try_send`, so a full or closing queue
//! only costs that subscriber the event.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::feed::event::FeedEvent;
use crate::feed::registry::TopicRegistry;

/// Outcome of one `publish` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers whose queue accepted the event.
    pub delivered: usize,
    /// Subscribers that missed it (queue full, or being torn down).
    pub dropped: usize,
}

impl PublishReport {
    pub fn total(&self) -> usize {
        self.delivered + self.dropped
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<TopicRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TopicRegistry>) -> Self {
        Self { registry }
    }

    /// Delivers `event` to every current subscriber of `topic`.
    ///
    /// Drop-newest on overflow: when a queue is at capacity the new event is
    /// discarded for that subscriber and its queued events stay untouched.
    pub fn publish(&self, topic: &str, event: FeedEvent) -> PublishReport {
        let subscribers = self.registry.snapshot(topic);
        let mut report = PublishReport::default();
        if subscribers.is_empty() {
            trace!(topic, "publish with no subscribers");
            return report;
        }

        let event = Arc::new(event);
        for slot in &subscribers {
            match slot.sender.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    trace!(topic, subscriber = %slot.id, post = %event.id, "queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    trace!(topic, subscriber = %slot.id, post = %event.id, "queue closed, event dropped");
                }
            }
        }
        report
    }
}
