//! Spawning the downloader with merged, line-oriented output capture.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use futures::Stream;
use mf_core::{DownloadError, JobId};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::wrappers::SplitStream;
use tokio_stream::StreamExt;

use super::job::{JobPaths, JobRequest};
use crate::command::ToolCommand;
use crate::process::ProcessGuard;
use crate::tools::{ToolRegistry, YTDLP};

/// Interleaved stdout and stderr lines of a running download.
pub type OutputLines = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

/// A running download: its lifetime guard and its output lines.
pub struct LaunchedDownload {
    pub guard: ProcessGuard,
    pub lines: OutputLines,
}

/// Resolve the downloader binary, as a startup failure if missing.
pub fn resolve_downloader(tools: &ToolRegistry) -> Result<PathBuf, DownloadError> {
    tools
        .require(YTDLP)
        .map(|cfg| cfg.path.clone())
        .map_err(|e| DownloadError::Startup {
            tool: YTDLP.to_string(),
            message: e.to_string(),
        })
}

/// The downloader invocation for one job.
pub fn download_command(ytdlp: &Path, request: &JobRequest, paths: &JobPaths, id: &JobId) -> ToolCommand {
    let mut cmd = ToolCommand::new(ytdlp.to_path_buf());
    cmd.arg("-f")
        .arg(request.format_selector())
        .arg("--merge-output-format")
        .arg(paths.merge_format())
        .args(["--newline", "--no-part", "--no-playlist"])
        .arg("-o")
        .arg(paths.output_template(id))
        .arg(request.url());
    cmd
}

/// Start the downloader for `id`.
///
/// If the returned guard is dropped before the process is waited on, the
/// process is killed and the job's partial files are removed.
pub fn launch(
    ytdlp: &Path,
    request: &JobRequest,
    paths: &JobPaths,
    id: &JobId,
) -> Result<LaunchedDownload, DownloadError> {
    let cmd = download_command(ytdlp, request, paths, id);
    tracing::debug!(job_id = %id, "Spawning: {cmd}");

    let mut process = cmd.command();
    process.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    process.process_group(0);

    let mut child = process.spawn().map_err(|e| DownloadError::Startup {
        tool: cmd.program_name(),
        message: e.to_string(),
    })?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(DownloadError::Unexpected("downloader output pipes unavailable".into()));
    };

    let cleanup_paths = paths.clone();
    let cleanup_id = *id;
    let guard = ProcessGuard::new(YTDLP, child)
        .kill_process_group()
        .on_abort(move || {
            cleanup_paths.remove_artifacts(&cleanup_id);
        });

    let lines: OutputLines = Box::pin(line_stream(stdout).merge(line_stream(stderr)));
    Ok(LaunchedDownload { guard, lines })
}

/// Newline-delimited lines, decoded lossily so stray bytes never end the job.
fn line_stream<R>(reader: R) -> impl Stream<Item = io::Result<String>> + Send
where
    R: AsyncRead + Send + Unpin,
{
    SplitStream::new(BufReader::new(reader).split(b'\n')).map(|chunk| {
        chunk.map(|bytes| {
            String::from_utf8_lossy(&bytes)
                .trim_end_matches('\r')
                .to_string()
        })
    })
}
