//! Per-request tracing span with an `x-trace-id` header.
//!
//! Small JSON bodies are logged in both directions. Whether a body is
//! buffered is decided from its content type and exact size hint before any
//! bytes are read; everything else (event streams, static files, large or
//! chunked uploads) is passed through untouched.

use crate::schemas::chat::ErrorBody;
use crate::state::AppState;
use axum::{
    Json,
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies larger than this are never buffered or logged.
const MAX_LOGGED_BODY: usize = 1024;

pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let mut response = match log_body("request", &parts.headers, body).await {
            Ok(body) => {
                let mut req = Request::from_parts(parts, body);
                if let Some(v) = &header_value {
                    req.headers_mut().insert(X_TRACE_ID, v.clone());
                }

                let response = next.run(req).await;
                let (parts, body) = response.into_parts();
                match log_body("response", &parts.headers, body).await {
                    Ok(body) => Response::from_parts(parts, body),
                    Err(e) => {
                        warn!(error = %e, "failed to read response body");
                        reject(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                    }
                }
            }
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                warn!("request body exceeded its declared length");
                reject(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
            }
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                reject(StatusCode::BAD_REQUEST, "failed to read request body")
            }
        };

        if let Some(v) = header_value {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );

        response
    }
    .instrument(span)
    .await
}

fn reject(status: StatusCode, error: &str) -> Response {
    let body = ErrorBody {
        error: error.to_owned(),
        hint: None,
    };
    (status, Json(body)).into_response()
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("text/event-stream")
}

/// Log `body` when it is small JSON, otherwise hand it back unread.
async fn log_body(
    direction: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Body, axum::BoxError> {
    let content_type = content_type(headers);
    let size = body.size_hint().exact();

    if is_event_stream(headers) {
        info!("{} body is an event stream; not buffered", direction);
        return Ok(body);
    }
    let small_json = content_type.contains("application/json")
        && size.is_some_and(|n| n <= MAX_LOGGED_BODY as u64);
    if !small_json {
        if size != Some(0) {
            info!(
                "{} body: [skipped: type={}, size={}]",
                direction,
                content_type,
                size.map_or_else(|| "unknown".to_owned(), |n| n.to_string())
            );
        }
        return Ok(body);
    }

    let bytes = Limited::new(body, MAX_LOGGED_BODY).collect().await?.to_bytes();
    if let Ok(text) = std::str::from_utf8(&bytes) {
        info!("{} body: {}", direction, text);
    }
    Ok(Body::from(bytes))
}
