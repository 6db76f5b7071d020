//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON `{"error": ...}`
//! body with an appropriate status code.
//!
//! Upstream status errors are passed through with the upstream status and
//! body, the same way the widget has always displayed them. Transport
//! failures are logged in full but answered with a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use starchat_coze::CozeError;
use thiserror::Error;
use tracing::error;

use crate::schemas::chat::ErrorBody;

/// Hint returned alongside [`ServerError::NotConfigured`].
pub const CONFIG_HINT: &str = "Set the COZE_API_TOKEN and COZE_BOT_ID environment variables";

/// All errors that can occur in the starchat-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the Coze client.
    #[error("upstream error: {0}")]
    Upstream(#[from] CozeError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The Coze token or bot id is missing.
    #[error("Coze API token or bot id is not configured")]
    NotConfigured,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error, hint) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
            ServerError::NotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                Some(CONFIG_HINT.to_owned()),
            ),
            ServerError::Upstream(e) => {
                let (status, message) = upstream_response(e);
                (status, message, None)
            }
        };
        let body = ErrorBody { error, hint };
        (status, Json(body)).into_response()
    }
}

/// Map a client error to the status and message the widget sees.
fn upstream_response(e: &CozeError) -> (StatusCode, String) {
    match e {
        CozeError::Status { status, .. } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, e.to_string())
        }
        CozeError::Api { .. } | CozeError::ChatFailed(_) => {
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
        CozeError::PollExhausted { .. } => (StatusCode::GATEWAY_TIMEOUT, e.to_string()),
        CozeError::Http(err) if err.is_timeout() => {
            error!(error = %e, "upstream request timed out");
            (StatusCode::GATEWAY_TIMEOUT, "upstream request timed out".to_owned())
        }
        CozeError::Http(_) | CozeError::Json(_) | CozeError::InvalidResponse { .. } => {
            error!(error = %e, "upstream request failed");
            (StatusCode::BAD_GATEWAY, "upstream request failed".to_owned())
        }
        CozeError::Config(_) => {
            error!(error = %e, "Coze client misconfigured");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
        }
    }
}
