//! # Request Log
//!
//! One `info` line per request with method, URI, status, elapsed time, peer
//! address, request id, and byte count. For GET and HEAD the byte count is the
//! response `Content-Length`; for PUT it is the request's. The request id is
//! also returned to the client as `x-request-id`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

pub async fn request_log_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    let method = request.method().clone();
    let uri = request.uri().to_string();
    let from = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let request_bytes = content_length(request.headers());

    let mut response = next.run(request).await;

    let bytes = if method == Method::GET || method == Method::HEAD {
        content_length(response.headers())
    } else {
        request_bytes
    };
    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER, HeaderValue::from(request_id));

    tracing::info!(
        status = response.status().as_u16(),
        elapsed = ?started.elapsed(),
        from = ?from,
        req_id = request_id,
        bytes = ?bytes,
        "{method} {uri}"
    );
    response
}
