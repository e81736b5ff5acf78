//! Post storage
//!
//! `PostStore` is the seam to whatever persists feed posts. Durable storage
//! lives outside this crate; `MemoryPostStore` keeps posts in process and
//! is what the bundled server runs with.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::feed::FeedEvent;
use crate::utils::error::{Error, Result};

pub trait PostStore: Send + Sync {
    /// Posts of a course, newest first.
    fn list(&self, course_id: &str) -> Result<Vec<FeedEvent>>;

    fn insert(&self, course_id: &str, post: FeedEvent) -> Result<FeedEvent>;

    /// Replaces the message of a post and marks it edited.
    fn update(
        &self,
        course_id: &str,
        post_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<FeedEvent>;

    fn delete(&self, course_id: &str, post_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPostStore {
    courses: RwLock<HashMap<String, Vec<FeedEvent>>>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(course_id: &str, post_id: &str) -> Error {
    Error::NotFound(format!("post {post_id} in course {course_id}"))
}

impl PostStore for MemoryPostStore {
    fn list(&self, course_id: &str) -> Result<Vec<FeedEvent>> {
        let courses = self.courses.read();
        let mut posts: Vec<FeedEvent> = courses
            .get(course_id)
            .map(|posts| posts.iter().rev().cloned().collect())
            .unwrap_or_default();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    fn insert(&self, course_id: &str, post: FeedEvent) -> Result<FeedEvent> {
        let mut courses = self.courses.write();
        let posts = courses.entry(course_id.to_string()).or_default();
        if posts.iter().any(|p| p.id == post.id) {
            return Err(Error::InvalidInput(format!("post {} already exists", post.id)));
        }
        posts.push(post.clone());
        Ok(post)
    }

    fn update(
        &self,
        course_id: &str,
        post_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<FeedEvent> {
        let mut courses = self.courses.write();
        let post = courses
            .get_mut(course_id)
            .and_then(|posts| posts.iter_mut().find(|p| p.id == post_id))
            .ok_or_else(|| not_found(course_id, post_id))?;
        *post = post.edited(message, at);
        Ok(post.clone())
    }

    fn delete(&self, course_id: &str, post_id: &str) -> Result<()> {
        let mut courses = self.courses.write();
        let posts = courses
            .get_mut(course_id)
            .ok_or_else(|| not_found(course_id, post_id))?;
        let before = posts.len();
        posts.retain(|p| p.id != post_id);
        if posts.len() == before {
            return Err(not_found(course_id, post_id));
        }
        if posts.is_empty() {
            courses.remove(course_id);
        }
        Ok(())
    }
}
