//! Serving finished downloads as attachments.
//!
//! Files are streamed in 64KB chunks through `ReaderStream`, with single
//! `Range: bytes=` requests honoured so players and download managers can
//! resume.

use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use mf_core::JobId;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::context::AppContext;
use crate::error::AppError;

const CHUNK_SIZE: usize = 64 * 1024;

/// GET /api/files/{job_id}
pub async fn get_file(
    State(ctx): State<AppContext>,
    UrlPath(job_id): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id: JobId = job_id
        .parse()
        .map_err(|_| mf_core::Error::Validation(format!("invalid job id: {job_id}")))?;

    let path = ctx.paths.output_path(&id);
    let filename = ctx.paths.download_filename(&id).await;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    Ok(serve_attachment(&path, &filename, range).await?)
}

/// Parse a `Range: bytes=START-END` header value. `END` is `None` for
/// open-ended ranges like `bytes=500-`.
pub fn parse_range_header(value: &str) -> Option<(u64, Option<u64>)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some((start, end))
}

/// MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// `Content-Disposition` for `filename`, with an ASCII fallback and an
/// RFC 5987 `filename*` for the full UTF-8 name.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            c if c.is_ascii_graphic() && c != '"' && c != '\\' => c,
            ' ' => ' ',
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        percent_encode(filename)
    )
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Stream `path` as an attachment named `filename`.
pub async fn serve_attachment(
    path: &Path,
    filename: &str,
    range_header: Option<&str>,
) -> mf_core::Result<Response> {
    let file_size = tokio::fs::metadata(path)
        .await
        .map_err(|_| mf_core::Error::not_found("file", filename))?
        .len();

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|_| mf_core::Error::not_found("file", filename))?;

    let content_type = content_type_for(path);
    let disposition = content_disposition(filename);

    let Some((start, end)) = range_header.and_then(parse_range_header) else {
        let body = Body::from_stream(ReaderStream::with_capacity(file, CHUNK_SIZE));
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CONTENT_LENGTH, file_size.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response());
    };

    let last = file_size.saturating_sub(1);
    let end = end.unwrap_or(last).min(last);
    if file_size == 0 || start > end {
        return Ok((
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{file_size}"))],
            Body::empty(),
        )
            .into_response());
    }

    let length = end - start + 1;
    file.seek(std::io::SeekFrom::Start(start))
        .await
        .map_err(|e| mf_core::Error::Internal(format!("seek failed: {e}")))?;
    let body = Body::from_stream(ReaderStream::with_capacity(file.take(length), CHUNK_SIZE));

    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_RANGE, format!("bytes {start}-{end}/{file_size}")),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        body,
    )
        .into_response())
}
