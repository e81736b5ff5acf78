//! Feed service
//!
//! The event source for the feed bus: every successful create or update of
//! a post is published to the course topic right after it is stored.
//! Deletions are stored but not broadcast; stream clients only ever receive
//! post payloads and re-fetch the feed to notice removals.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::feed::{FeedBus, FeedEvent, PostKind};
use crate::posts::store::PostStore;
use crate::utils::error::{Error, Result};

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn PostStore>,
    bus: FeedBus,
}

impl std::fmt::Debug for FeedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedService")
            .field("store", &"dyn PostStore")
            .field("bus", &self.bus)
            .finish()
    }
}

/// Posts are stamped with second precision.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(Error::InvalidInput("message must not be empty".to_string()));
    }
    Ok(())
}

impl FeedService {
    pub fn new(store: Arc<dyn PostStore>, bus: FeedBus) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &FeedBus {
        &self.bus
    }

    pub fn feed(&self, course_id: &str) -> Result<Vec<FeedEvent>> {
        self.store.list(course_id)
    }

    pub fn create_manual_post(&self, course_id: &str, message: &str) -> Result<FeedEvent> {
        self.create_post(course_id, PostKind::Manual, message)
    }

    /// Used by other services (materials, quizzes) to announce changes.
    pub fn create_automatic_post(&self, course_id: &str, message: &str) -> Result<FeedEvent> {
        self.create_post(course_id, PostKind::Automatic, message)
    }

    pub fn update_post(&self, course_id: &str, post_id: &str, message: &str) -> Result<FeedEvent> {
        validate_message(message)?;
        let post = self.store.update(course_id, post_id, message, now())?;
        self.broadcast(course_id, &post);
        Ok(post)
    }

    pub fn delete_post(&self, course_id: &str, post_id: &str) -> Result<()> {
        self.store.delete(course_id, post_id)
    }

    fn create_post(&self, course_id: &str, kind: PostKind, message: &str) -> Result<FeedEvent> {
        validate_message(message)?;
        let post = FeedEvent::new(Uuid::new_v4().to_string(), kind, message, now());
        let post = self.store.insert(course_id, post)?;
        self.broadcast(course_id, &post);
        Ok(post)
    }

    fn broadcast(&self, course_id: &str, post: &FeedEvent) {
        let report = self.bus.publish(course_id, post.clone());
        debug!(
            course = course_id,
            post = %post.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "feed post broadcast"
        );
    }
}
