//! Live merged stream for in-browser playback.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use mf_av::JobRequest;

use super::MediaQuery;
use crate::context::AppContext;
use crate::error::AppError;

/// GET /api/stream?url=..&format_id=..
pub async fn stream(
    State(ctx): State<AppContext>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, AppError> {
    let request = JobRequest::new(query.url, query.format_id)?;
    tracing::info!(url = request.url(), format = request.format_id(), "Streaming");

    let bytes = mf_av::stream::stream_merged(&ctx.tools, &request)?;
    Ok((
        [
            (header::CONTENT_TYPE, mf_av::stream::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from_stream(bytes),
    )
        .into_response())
}
