//! Topic registry
//!
//! Maps a course topic to the set of live subscriber queues. The registry is
//! the only shared mutable state of the bus and is guarded by a single
//! reader/writer lock:
//! - `register` / `unregister` / `clear` take the write lock
//! - `register` checks the subscription token under that lock, so a
//!   registration racing with shutdown either lands before `clear` or is
//!   refused
//! - `snapshot` takes the read lock and copies the senders out, so a
//!   broadcast never iterates the map while it is being mutated
//!
//! The lock is never held across an `.await`.
//!
//! Subscribers are keyed by id inside each topic, which gives O(1) removal
//! on disconnect. A topic entry is removed once its last subscriber leaves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::feed::event::FeedEvent;
use crate::feed::subscriber::SubscriberId;

/// Producer side of one subscriber queue.
pub type EventSender = mpsc::Sender<Arc<FeedEvent>>;

/// A registered subscriber as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct SubscriberSlot {
    pub id: SubscriberId,
    pub sender: EventSender,
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, HashMap<SubscriberId, EventSender>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber queue under `topic`, creating the topic if needed.
    ///
    /// Returns `false` and registers nothing if `token` is already cancelled.
    pub(crate) fn register(
        &self,
        topic: &str,
        id: SubscriberId,
        sender: EventSender,
        token: &CancellationToken,
    ) -> bool {
        let mut topics = self.topics.write();
        if token.is_cancelled() {
            return false;
        }
        topics.entry(topic.to_string()).or_default().insert(id, sender);
        true
    }

    /// Removes a subscriber from `topic`.
    ///
    /// Returns `false` when the subscriber was not registered (already
    /// removed, or never there). The registry's sender is dropped here; the
    /// queue is closed once no in-flight broadcast still holds a copy.
    pub(crate) fn unregister(&self, topic: &str, id: &SubscriberId) -> bool {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.remove(id).is_some();
        if subscribers.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Copies the current subscribers of `topic` for one broadcast.
    pub fn snapshot(&self, topic: &str) -> Vec<SubscriberSlot> {
        self.topics
            .read()
            .get(topic)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|(id, sender)| SubscriberSlot {
                        id: *id,
                        sender: sender.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, topic: &str, id: &SubscriberId) -> bool {
        self.topics
            .read()
            .get(topic)
            .is_some_and(|subscribers| subscribers.contains_key(id))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, HashMap::len)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Drops every registered queue. Returns how many subscribers were removed.
    pub(crate) fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.topics.write());
        drained.values().map(HashMap::len).sum()
    }
}
