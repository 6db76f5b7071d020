//! Chat-widget route.
//!
//! Forwards one user message to the Coze bot. Streaming requests get the
//! upstream deltas re-framed as `{"content": ...}` SSE events terminated by
//! `[DONE]`; non-streaming requests create the chat, poll it to completion
//! and answer with the normalized reply text.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use starchat_coze::{Frame, StreamItem};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::chat::{ChatReply, ChatRequest, ErrorBody};
use crate::state::AppState;

/// Maximum accepted message length in bytes.
const MAX_MESSAGE_BYTES: usize = 16 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(ChatRequest, ChatReply, ErrorBody))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/chat", post(chat))
}

/// Send a message to the bot (`POST /api/chat`).
///
/// With `stream: true` (the default) the reply is streamed as SSE frames:
/// `data: {"content": "..."}` per fragment, `data: {"error": "..."}` if the
/// upstream fails mid-reply, and a final `data: [DONE]`.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply (JSON) or SSE frame stream", body = ChatReply),
        (status = 400, description = "Empty or oversized message", body = ErrorBody),
        (status = 500, description = "Upstream not configured", body = ErrorBody),
        (status = 502, description = "Upstream failure", body = ErrorBody),
        (status = 504, description = "Reply did not complete in time", body = ErrorBody),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ServerError::BadRequest("message must not be empty".into()));
    }
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message too large ({} bytes); maximum is {} bytes",
            message.len(),
            MAX_MESSAGE_BYTES,
        )));
    }

    let coze = state.coze()?;
    debug!(message_len = message.len(), stream = req.stream, user_id = ?req.user_id, "chat request");

    if req.stream {
        let upstream = coze.open_stream(message, req.user_id.as_deref()).await?;
        let frames = upstream.map(|item| {
            let frame = match item {
                StreamItem::Delta(text) => Frame::Content(text),
                StreamItem::Error(e) => Frame::Error(e),
                StreamItem::Done => Frame::Done,
            };
            Ok::<Event, Infallible>(Event::default().data(frame.payload()))
        });
        return Ok(Sse::new(frames).into_response());
    }

    let reply = coze.chat_and_wait(message, req.user_id.as_deref()).await?;
    info!(reply_len = reply.len(), "chat reply ready");

    Ok(Json(ChatReply { reply }).into_response())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use axum::routing::get;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes;

    const SSE_BODY: &str = concat!(
        "event: conversation.message.delta\n",
        "data: {\"role\":\"assistant\",\"type\":\"answer\",\"content\":\"Hello\"}\n\n",
        "event: conversation.message.delta\n",
        "data: {\"role\":\"assistant\",\"type\":\"answer\",\"content\":\" world\"}\n\n",
        "event: done\n",
        "data: \"[DONE]\"\n\n",
    );

    const FAILING_SSE_BODY: &str = concat!(
        "event: conversation.message.delta\n",
        "data: {\"role\":\"assistant\",\"type\":\"answer\",\"content\":\"Hel\"}\n\n",
        "event: conversation.chat.failed\n",
        "data: {\"last_error\":{\"code\":5000,\"msg\":\"bot offline\"}}\n\n",
        "event: done\n",
        "data: \"[DONE]\"\n\n",
    );

    #[derive(Clone, Copy)]
    enum Upstream {
        /// Streams two deltas; completes non-streaming chats on the first poll.
        Healthy,
        /// Streams one delta, then reports the chat as failed.
        FailsMidStream,
        /// Answers every chat with 401.
        Rejects,
        /// Answers 200 with a non-zero envelope code.
        BusinessError,
    }

    async fn spawn_upstream(kind: Upstream) -> String {
        let app = Router::new()
            .route(
                "/v3/chat",
                post(move |Json(body): Json<Value>| async move {
                    match kind {
                        Upstream::Rejects => {
                            (StatusCode::UNAUTHORIZED, "token invalid").into_response()
                        }
                        Upstream::BusinessError => {
                            Json(json!({ "code": 4200, "msg": "bot not published" })).into_response()
                        }
                        _ if body["stream"] == true => {
                            let sse = match kind {
                                Upstream::FailsMidStream => FAILING_SSE_BODY,
                                _ => SSE_BODY,
                            };
                            ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
                        }
                        _ => Json(json!({
                            "code": 0,
                            "data": { "id": "c1", "conversation_id": "v1", "status": "in_progress" }
                        }))
                        .into_response(),
                    }
                }),
            )
            .route(
                "/v3/chat/retrieve",
                get(|| async {
                    Json(json!({
                        "code": 0,
                        "data": { "id": "c1", "conversation_id": "v1", "status": "completed" }
                    }))
                }),
            )
            .route(
                "/v3/chat/message/list",
                get(|| async {
                    Json(json!({
                        "code": 0,
                        "data": [{ "role": "assistant", "type": "answer", "content": "Polled hello" }]
                    }))
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn frames(body: &str) -> Vec<&str> {
        body.lines().filter_map(|l| l.strip_prefix("data: ")).collect()
    }

    fn state(base_url: Option<String>) -> Arc<AppState> {
        let cfg = Config {
            enable_swagger: false,
            ..Config::default()
        };
        let coze = base_url.map(|base| {
            starchat_coze::CozeClient::builder(base, "tok", "bot")
                .set_poll_interval(Duration::from_millis(5))
                .no_proxy()
                .build()
                .unwrap()
        });
        Arc::new(AppState {
            config: Arc::new(cfg),
            coze,
        })
    }

    async fn post_chat(state: Arc<AppState>, body: Value) -> (StatusCode, HeaderMap, String) {
        let req = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = routes::build(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let (status, _, body) = post_chat(state(None), json!({ "message": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "message must not be empty");
    }

    #[tokio::test]
    async fn unconfigured_upstream_returns_hint() {
        let (status, _, body) = post_chat(state(None), json!({ "message": "hi" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["hint"].as_str().unwrap().contains("COZE_BOT_ID"));
    }

    #[tokio::test]
    async fn streaming_reply_is_reframed() {
        let base = spawn_upstream(Upstream::Healthy).await;
        let (status, headers, body) =
            post_chat(state(Some(base)), json!({ "message": "hi", "userId": "u1" })).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            frames(&body),
            vec![r#"{"content":"Hello"}"#, r#"{"content":" world"}"#, "[DONE]"]
        );
    }

    #[tokio::test]
    async fn mid_stream_failure_reaches_the_widget() {
        let base = spawn_upstream(Upstream::FailsMidStream).await;
        let (status, _, body) = post_chat(state(Some(base)), json!({ "message": "hi" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            frames(&body),
            vec![r#"{"content":"Hel"}"#, r#"{"error":"bot offline"}"#, "[DONE]"]
        );
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through_before_streaming() {
        let base = spawn_upstream(Upstream::Rejects).await;
        let (status, _, body) = post_chat(state(Some(base)), json!({ "message": "hi" })).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Coze API call failed: 401 token invalid");
    }

    #[tokio::test]
    async fn business_error_is_bad_gateway() {
        let base = spawn_upstream(Upstream::BusinessError).await;
        let (status, _, body) =
            post_chat(state(Some(base)), json!({ "message": "hi", "stream": false })).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Coze API error 4200: bot not published");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let (status, _, body) =
            post_chat(state(Some(base)), json!({ "message": "hi", "stream": false })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "upstream request failed");
    }

    #[tokio::test]
    async fn non_streaming_reply_is_polled() {
        let base = spawn_upstream(Upstream::Healthy).await;
        let (status, _, body) =
            post_chat(state(Some(base)), json!({ "message": "hi", "stream": false })).await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["reply"], "Polled hello");
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let big = "x".repeat(MAX_MESSAGE_BYTES + 1);
        let (status, _, _) = post_chat(state(None), json!({ "message": big })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
