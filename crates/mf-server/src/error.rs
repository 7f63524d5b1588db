//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; any [`mf_core::Error`]
//! converts with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so `IntoResponse` can be implemented for [`mf_core::Error`].
#[derive(Debug)]
pub struct AppError {
    inner: mf_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: mf_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Machine-readable error code for the response body.
    pub fn code(&self) -> &'static str {
        match &self.inner {
            mf_core::Error::NotFound { .. } => "not_found",
            mf_core::Error::Validation(_) => "validation_error",
            mf_core::Error::Io { .. } => "io_error",
            mf_core::Error::Tool { .. } => "tool_error",
            mf_core::Error::Download(_) => "download_error",
            mf_core::Error::Internal(_) => "internal_error",
        }
    }
}

impl From<mf_core::Error> for AppError {
    fn from(e: mf_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.inner, "Server error in API handler");
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Request rejected");
        }

        let mut body = json!({
            "error": self.inner.to_string(),
            "code": self.code(),
            "request_id": self.request_id,
        });
        if let mf_core::Error::Download(e) = &self.inner {
            body["kind"] = json!(e.kind());
        }

        (status, axum::Json(body)).into_response()
    }
}
