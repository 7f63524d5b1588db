//! Blocking download: run the whole job, then return the file.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::Extension;
use mf_av::JobRequest;

use super::files::serve_attachment;
use super::MediaQuery;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// GET /api/download?url=..&format_id=..
///
/// The title lookup runs alongside the download. If the client disconnects,
/// the handler future is dropped and the downloader is killed with it.
pub async fn download(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let with_id = |e: mf_core::Error| AppError::new(e).with_request_id(request_id.0.clone());

    let request = JobRequest::new(query.url, query.format_id).map_err(with_id)?;
    let job = ctx.new_job(request.clone());
    let id = job.id();

    let (title, result) = tokio::join!(
        mf_av::extract::fetch_title(&ctx.tools, request.url()),
        mf_av::download_to_file(&ctx.tools, job, |_| {}, None),
    );
    let path = result.map_err(with_id)?;

    if let Some(title) = title {
        if let Err(e) = ctx.paths.write_title(&id, &title).await {
            tracing::warn!(job_id = %id, "Failed to write title: {e}");
        }
    }

    let filename = ctx.paths.download_filename(&id).await;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    serve_attachment(&path, &filename, range).await.map_err(with_id)
}
