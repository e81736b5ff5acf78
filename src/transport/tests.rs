use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::sse;
use super::{AppState, serve};
use crate::feed::{FeedBus, FeedEvent, PostKind};
use crate::posts::{FeedService, MemoryPostStore};
use crate::utils::error::Result;

const WAIT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: SocketAddr,
    bus: FeedBus,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

async fn start_server() -> TestServer {
    let bus = FeedBus::default();
    let feed = FeedService::new(Arc::new(MemoryPostStore::new()), bus.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(serve(listener, AppState::new(feed), shutdown.clone()));
    TestServer {
        addr,
        bus,
        shutdown,
        handle,
    }
}

/// Sends one request with `Connection: close` and returns status and body.
async fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = body.unwrap_or("");
    let req = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut raw))
        .await
        .expect("response timed out")
        .unwrap();
    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, body.to_string())
}

async fn open_stream(addr: SocketAddr, course: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET /courses/{course}/feed/stream HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut seen = String::new();
    read_until(&mut stream, &mut seen, sse::CONNECTED).await;
    (stream, seen)
}

async fn read_until(stream: &mut TcpStream, seen: &mut String, needle: &str) {
    tokio::time::timeout(WAIT, async {
        let mut buf = [0u8; 4096];
        while !seen.contains(needle) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed before {needle:?}");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, got {seen:?}"));
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

fn data_line(frames: &str) -> FeedEvent {
    let start = frames.find("event: new_post\ndata: ").expect("no new_post frame");
    let rest = &frames[start + "event: new_post\ndata: ".len()..];
    let end = rest.find("\n\n").expect("unterminated frame");
    serde_json::from_str(&rest[..end]).unwrap()
}

#[test]
fn test_encode_event_frame() {
    let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let ev = FeedEvent::new("p1", PostKind::Manual, "hi", at);
    let frame = sse::encode_event(&ev).unwrap();

    assert_eq!(
        frame,
        "event: new_post\ndata: {\"uuid\":\"p1\",\"type\":\"manual\",\"message\":\"hi\",\"edited\":false,\"createdAt\":\"2024-05-06T07:08:09Z\",\"updatedAt\":\"2024-05-06T07:08:09Z\"}\n\n"
    );
}

#[tokio::test]
async fn test_frames_start_with_connected_comment() {
    let bus = FeedBus::default();
    let (sub, cancel) = bus.subscribe("course-1").unwrap();
    let mut frames = Box::pin(sse::frames(sub));

    let first = frames.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b": connected\n\n");

    let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let ev = FeedEvent::new("p1", PostKind::Manual, "hi", at);
    bus.publish("course-1", ev.clone());
    let second = frames.next().await.unwrap().unwrap();
    assert_eq!(second, sse::encode_event(&ev).unwrap().as_bytes());

    cancel.cancel();
    assert!(frames.next().await.is_none());
}

#[tokio::test]
async fn test_stream_headers_and_connected() {
    let server = start_server().await;
    let (_stream, seen) = open_stream(server.addr, "course-1").await;

    let head = seen.to_lowercase();
    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("content-type: text/event-stream"));
    assert!(head.contains("cache-control: no-cache"));
    assert!(head.contains("connection: keep-alive"));
    assert_eq!(server.bus.subscriber_count("course-1"), 1);
}

#[tokio::test]
async fn test_created_post_reaches_stream() {
    let server = start_server().await;
    let (mut stream, mut seen) = open_stream(server.addr, "course-1").await;

    let (status, body) = request(
        server.addr,
        "POST",
        "/courses/course-1/feed",
        Some(r#"{"message":"hi"}"#),
    )
    .await;
    assert_eq!(status, 201);
    let created: FeedEvent = serde_json::from_str(&body).unwrap();
    assert_eq!(created.message, "hi");
    assert_eq!(created.kind, PostKind::Manual);

    read_until(&mut stream, &mut seen, "}\n\n").await;
    assert_eq!(data_line(&seen), created);
}

#[tokio::test]
async fn test_other_course_stream_sees_nothing() {
    let server = start_server().await;
    let (mut stream, _) = open_stream(server.addr, "course-1").await;

    let (status, _) = request(
        server.addr,
        "POST",
        "/courses/course-2/feed",
        Some(r#"{"message":"elsewhere"}"#),
    )
    .await;
    assert_eq!(status, 201);

    let mut buf = [0u8; 1024];
    let read = tokio::time::timeout(Duration::from_millis(100), stream.read(&mut buf)).await;
    assert!(read.is_err(), "course-1 stream should stay quiet");
}

#[tokio::test]
async fn test_feed_crud_routes() {
    let server = start_server().await;
    let addr = server.addr;

    let (status, body) = request(addr, "POST", "/courses/c1/feed", Some(r#"{"message":"first"}"#)).await;
    assert_eq!(status, 201);
    let post: FeedEvent = serde_json::from_str(&body).unwrap();

    let (status, body) = request(addr, "GET", "/courses/c1/feed", None).await;
    assert_eq!(status, 200);
    let feed: Vec<FeedEvent> = serde_json::from_str(&body).unwrap();
    assert_eq!(feed, vec![post.clone()]);

    let path = format!("/courses/c1/feed/{}", post.id);
    let (status, body) = request(addr, "PUT", &path, Some(r#"{"message":"second","edited":true}"#)).await;
    assert_eq!(status, 200);
    let updated: FeedEvent = serde_json::from_str(&body).unwrap();
    assert!(updated.edited);
    assert_eq!(updated.message, "second");

    let (status, _) = request(addr, "DELETE", &path, None).await;
    assert_eq!(status, 204);

    let (status, body) = request(addr, "DELETE", &path, None).await;
    assert_eq!(status, 404);
    let error: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains(&post.id));
}

#[tokio::test]
async fn test_update_ignores_client_edited_flag() {
    let server = start_server().await;
    let addr = server.addr;
    let (_, body) = request(addr, "POST", "/courses/c1/feed", Some(r#"{"message":"first"}"#)).await;
    let post: FeedEvent = serde_json::from_str(&body).unwrap();

    let path = format!("/courses/c1/feed/{}", post.id);
    let (status, body) = request(addr, "PUT", &path, Some(r#"{"message":"again","edited":false}"#)).await;
    assert_eq!(status, 200);
    let updated: FeedEvent = serde_json::from_str(&body).unwrap();
    assert!(updated.edited);

    let (status, body) = request(addr, "PUT", &path, Some(r#"{"message":"plain"}"#)).await;
    assert_eq!(status, 200);
    let updated: FeedEvent = serde_json::from_str(&body).unwrap();
    assert!(updated.edited);
    assert_eq!(updated.message, "plain");
}

#[tokio::test]
async fn test_invalid_bodies_are_rejected() {
    let server = start_server().await;

    let (status, body) = request(server.addr, "POST", "/courses/c1/feed", Some("not json")).await;
    assert_eq!(status, 400);
    let error: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "invalid input: Invalid request body");

    let (status, _) = request(server.addr, "POST", "/courses/c1/feed", Some(r#"{"message":""}"#)).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_client_disconnect_unsubscribes() {
    let server = start_server().await;
    let (stream, _) = open_stream(server.addr, "course-1").await;
    assert_eq!(server.bus.subscriber_count("course-1"), 1);

    drop(stream);

    // hyper sees the peer close and drops the response body, no publish needed
    let bus = server.bus.clone();
    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.subscriber_count("course-1") > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("subscription was not cleaned up");
}

#[tokio::test]
async fn test_shutdown_ends_streams_and_server() {
    let server = start_server().await;
    let (_stream, _) = open_stream(server.addr, "course-1").await;

    server.shutdown.cancel();
    let bus = server.bus.clone();
    wait_for(|| bus.is_shut_down()).await;
    assert_eq!(server.bus.topic_count(), 0);

    tokio::time::timeout(WAIT, server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
