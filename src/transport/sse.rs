//! Server-Sent Events framing for feed streams
//!
//! Wire contract of a feed stream:
//! - headers `content-type: text/event-stream`, `cache-control: no-cache`,
//!   `connection: keep-alive`
//! - `: connected\n\n` straight away
//! - one `event: new_post\ndata: <json>\n\n` frame per delivered event
//!
//! No end-of-stream frame is ever written; the body simply ends when the
//! subscription does.

use std::convert::Infallible;

use axum::body::Bytes;
use futures::{Stream, StreamExt, stream};
use tracing::warn;

use crate::feed::{FeedEvent, Subscription};
use crate::utils::error::Result;

pub const CONTENT_TYPE: &str = "text/event-stream";
pub const CACHE_CONTROL: &str = "no-cache";
pub const CONNECTION: &str = "keep-alive";

/// Comment line sent before any event to establish the stream.
pub const CONNECTED: &str = ": connected\n\n";

pub const NEW_POST_EVENT: &str = "new_post";

pub fn encode_event(event: &FeedEvent) -> Result<String> {
    let data = serde_json::to_string(event)?;
    Ok(format!("event: {NEW_POST_EVENT}\ndata: {data}\n\n"))
}

/// Body chunks for one feed stream: the connected comment, then a frame per
/// event until the subscription ends. Dropping the stream ends the subscription.
pub fn frames(
    subscription: Subscription,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let subscriber = subscription.id();
    let connected = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(CONNECTED.as_bytes())) });
    let events = subscription
        .into_stream()
        .filter_map(move |event| async move {
            match encode_event(&event) {
                Ok(frame) => Some(Ok::<_, Infallible>(Bytes::from(frame))),
                Err(e) => {
                    warn!(subscriber = %subscriber, post = %event.id, "failed to encode feed event: {e}");
                    None
                }
            }
        });
    connected.chain(events)
}
