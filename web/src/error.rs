use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use filters_core::{CoreError, ErrorExt};
use serde_json::json;

/// Failures surfaced by handlers. The variant picks how the browser sees it.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Read by the listing script, which only understands JSON.
    #[error("Listing error: {0}")]
    Listing(CoreError),

    #[error("Upstream error: {0}")]
    Upstream(CoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] CoreError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match &self {
            WebError::Listing(e) => {
                e.log_warn();
                Json(json!({ "error": e.user_friendly_message() })).into_response()
            }
            WebError::Upstream(e) => {
                e.log_error();
                (StatusCode::BAD_GATEWAY, e.user_friendly_message()).into_response()
            }
            WebError::Internal(e) => {
                e.log_error();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

pub type WebResult<T> = Result<T, WebError>;
