//! HTTP transport
//!
//! axum routes for a course feed:
//! - `GET    /courses/{course_id}/feed`            list posts
//! - `POST   /courses/{course_id}/feed`            create a manual post
//! - `PUT    /courses/{course_id}/feed/{post_id}`  edit a post
//! - `DELETE /courses/{course_id}/feed/{post_id}`  delete a post
//! - `GET    /courses/{course_id}/feed/stream`     live SSE feed
//!
//! A stream lives as long as its response body: a client disconnect drops
//! the body, which drops the subscription and unregisters it from the bus.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::feed::FeedEvent;
use crate::posts::FeedService;
use crate::transport::sse;
use crate::utils::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct AppState {
    pub feed: FeedService,
}

impl AppState {
    pub fn new(feed: FeedService) -> Self {
        Self { feed }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub message: String,
    /// Accepted and ignored; a successful update always marks the post edited.
    #[serde(default, rename = "edited")]
    _edited: bool,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Serialize(_) | Error::Io(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| Error::InvalidInput("Invalid request body".to_string()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/courses/{course_id}/feed", get(get_feed).post(create_post))
        .route("/courses/{course_id}/feed/stream", get(stream_feed))
        .route(
            "/courses/{course_id}/feed/{post_id}",
            put(update_post).delete(delete_post),
        )
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    let status = response.status().as_u16();
    if response.status().is_server_error() {
        warn!(%method, %uri, status, "request failed");
    } else {
        info!(%method, %uri, status, "request");
    }
    response
}

async fn get_feed(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<FeedEvent>>> {
    Ok(Json(state.feed.feed(&course_id)?))
}

async fn create_post(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FeedEvent>)> {
    let req = body(payload)?;
    let post = state.feed.create_manual_post(&course_id, &req.message)?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    Path((course_id, post_id)): Path<(String, String)>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<FeedEvent>> {
    let req = body(payload)?;
    let post = state.feed.update_post(&course_id, &post_id, &req.message)?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    Path((course_id, post_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.feed.delete_post(&course_id, &post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stream_feed(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Response> {
    // Dropping the cancel handle does not end the stream; the body owns it.
    let (subscription, _cancel) = state.feed.bus().subscribe(&course_id)?;
    info!(course = %course_id, subscriber = %subscription.id(), "feed stream opened");

    let headers = [
        (header::CONTENT_TYPE, sse::CONTENT_TYPE),
        (header::CACHE_CONTROL, sse::CACHE_CONTROL),
        (header::CONNECTION, sse::CONNECTION),
    ];
    Ok((headers, Body::from_stream(sse::frames(subscription))).into_response())
}

pub async fn bind(settings: &ServerSettings) -> Result<TcpListener> {
    Ok(TcpListener::bind(settings.addr()).await?)
}

/// Serves the feed API on `listener` until `shutdown` fires, then shuts the
/// feed bus down so open streams end and the server can drain.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("feed server listening on http://{addr}");

    let bus = state.feed.bus().clone();
    let signal = {
        let bus = bus.clone();
        async move {
            shutdown.cancelled().await;
            info!("shutdown requested, closing feed streams");
            bus.shutdown();
        }
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(signal)
        .await?;
    bus.shutdown();
    info!("feed server stopped");
    Ok(())
}
