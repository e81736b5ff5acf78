//! The `posts` module is the feed bus's event source: it stores course feed
//! posts through a `PostStore` and publishes creations and edits.

pub mod service;
pub mod store;

pub use service::FeedService;
pub use store::{MemoryPostStore, PostStore};
