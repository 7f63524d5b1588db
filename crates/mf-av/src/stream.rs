//! Direct streaming of a merged download without touching disk.
//!
//! `yt-dlp -o -` writes the merged media to stdout, which is piped straight
//! into `ffmpeg -c copy` to produce fragmented MP4 that players can start on
//! before the download finishes.

use std::io;
use std::process::Stdio;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::ReaderStream;

use crate::command::ToolCommand;
use crate::download::JobRequest;
use crate::process::{exit_code, ProcessGuard};
use crate::tools::{ToolRegistry, FFMPEG, YTDLP};

/// Content type of the produced stream.
pub const CONTENT_TYPE: &str = "video/mp4";

/// The downloader half of the pipe.
pub fn downloader_command(tools: &ToolRegistry, request: &JobRequest) -> mf_core::Result<ToolCommand> {
    let ytdlp = tools.require(YTDLP)?;
    let mut cmd = ToolCommand::new(ytdlp.path.clone());
    cmd.arg("-f")
        .arg(request.format_selector())
        .args(["--no-playlist", "--no-part", "--quiet", "-o", "-"])
        .arg(request.url());
    Ok(cmd)
}

/// The remuxer half of the pipe.
pub fn remux_command(tools: &ToolRegistry) -> mf_core::Result<ToolCommand> {
    let ffmpeg = tools.require(FFMPEG)?;
    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.args([
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        "pipe:0",
        "-c",
        "copy",
        "-f",
        "mp4",
        "-movflags",
        "frag_keyframe+empty_moov",
        "pipe:1",
    ]);
    Ok(cmd)
}

/// Start both processes and return the remuxed byte stream.
///
/// Dropping the stream kills both processes.
pub fn stream_merged(
    tools: &ToolRegistry,
    request: &JobRequest,
) -> mf_core::Result<impl Stream<Item = io::Result<Bytes>> + Send + 'static> {
    let download = downloader_command(tools, request)?;
    let remux = remux_command(tools)?;

    tracing::debug!("Spawning: {download}");
    let mut downloader = download.command();
    downloader.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    downloader.process_group(0);
    let mut downloader = downloader
        .spawn()
        .map_err(|e| mf_core::Error::tool(YTDLP, format!("failed to spawn: {e}")))?;

    let (Some(media), Some(stderr)) = (downloader.stdout.take(), downloader.stderr.take()) else {
        return Err(mf_core::Error::Internal("downloader pipes unavailable".into()));
    };
    let downloader = ProcessGuard::new(YTDLP, downloader).kill_process_group();

    let media: Stdio = media
        .try_into()
        .map_err(|e| mf_core::Error::Internal(format!("cannot hand pipe to ffmpeg: {e}")))?;

    tracing::debug!("Spawning: {remux}");
    let mut remuxer = remux.command();
    remuxer.stdin(media).stdout(Stdio::piped()).stderr(Stdio::null());
    let mut remuxer = remuxer
        .spawn()
        .map_err(|e| mf_core::Error::tool(FFMPEG, format!("failed to spawn: {e}")))?;
    let Some(output) = remuxer.stdout.take() else {
        return Err(mf_core::Error::Internal("ffmpeg stdout unavailable".into()));
    };
    let remuxer = ProcessGuard::new(FFMPEG, remuxer);

    // Diagnostics only; the task ends when the downloader closes stderr.
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(tool = YTDLP, "{line}");
        }
    });

    let url = request.url().to_string();
    Ok(async_stream::stream! {
        let mut downloader = downloader;
        let mut remuxer = remuxer;
        let mut chunks = ReaderStream::new(output);
        let mut sent: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
            }
            yield chunk;
        }

        for (tool, guard) in [(FFMPEG, &mut remuxer), (YTDLP, &mut downloader)] {
            match guard.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => tracing::warn!(tool, code = exit_code(status), %url, "Stream process failed"),
                Err(e) => tracing::warn!(tool, %url, "Waiting for stream process: {e}"),
            }
        }
        tracing::info!(%url, bytes = sent, "Stream finished");
    })
}
