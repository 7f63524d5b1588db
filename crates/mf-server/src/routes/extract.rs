//! Metadata extraction.

use axum::extract::State;
use axum::{Extension, Json};
use mf_core::media::VideoInfo;
use serde::Deserialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
}

/// POST /api/extract
pub async fn extract(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<VideoInfo>, AppError> {
    mf_av::extract::extract(&ctx.tools, &req.url)
        .await
        .map(Json)
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))
}
