//! Feed event definitions
//!
//! `FeedEvent` is the payload pushed to every live feed stream of a course.
//! It is produced by the post collaborator at create/update time and is
//! never mutated by the bus; "editing" a post yields a new value.
//!
//! Wire notes (the JSON a stream client receives):
//! - `uuid`: post identifier
//! - `type`: `"manual"` or `"auto"`
//! - `message`, `edited`
//! - `createdAt` / `updatedAt`: RFC 3339, UTC, `Z` suffix

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a feed post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostKind {
    /// Written by a course author through the feed endpoints.
    #[serde(rename = "manual")]
    Manual,
    /// Generated by another part of the system (new material, new quiz, ...).
    #[serde(rename = "auto")]
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub message: String,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedEvent {
    /// A freshly created, never edited post.
    pub fn new(
        id: impl Into<String>,
        kind: PostKind,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            message: message.into(),
            edited: false,
            created_at,
            updated_at: created_at,
        }
    }

    /// Returns the edited version of this post. `created_at` is kept.
    #[must_use]
    pub fn edited(&self, message: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            message: message.into(),
            edited: true,
            created_at: self.created_at,
            updated_at,
        }
    }
}
