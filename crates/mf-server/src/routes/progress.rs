//! Progress-reporting download over Server-Sent Events.
//!
//! Each SSE `data:` line carries one protocol event in its wire form:
//! `started`, `progress:<pct>`, `done:<job_id>` or `error:<message>`. The
//! stream ends after the terminal event. Closing the connection drops the
//! stream, which kills the downloader and removes partial output.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use mf_av::{JobRequest, YtDlpProgressParser};

use super::MediaQuery;
use crate::context::AppContext;
use crate::error::AppError;

/// GET /api/download/progress?url=..&format_id=..
pub async fn download_progress(
    State(ctx): State<AppContext>,
    Query(query): Query<MediaQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let request = JobRequest::new(query.url, query.format_id)?;
    let job = ctx.new_job(request);
    let id = job.id();

    // Best effort: a missing title only changes the attachment name.
    if let Some(title) = mf_av::extract::fetch_title(&ctx.tools, job.request().url()).await {
        if let Err(e) = ctx.paths.ensure_root().await {
            tracing::warn!(job_id = %id, "Cannot create download dir: {e}");
        } else if let Err(e) = ctx.paths.write_title(&id, &title).await {
            tracing::warn!(job_id = %id, "Failed to write title: {e}");
        }
    }

    let events = mf_av::progress_events(&ctx.tools, job, YtDlpProgressParser)
        .map(|event| Ok(Event::default().data(event.to_wire())));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
