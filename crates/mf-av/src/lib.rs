//! # mf-av
//!
//! External tool integration for mediafetch.
//!
//! - **Tool discovery** ([`ToolRegistry`]): resolve `yt-dlp` and `ffmpeg`.
//! - **Command execution** ([`ToolCommand`]): builder for one-shot and
//!   long-running invocations.
//! - **Metadata extraction** ([`extract`]): `yt-dlp -J` into
//!   [`mf_core::media::VideoInfo`].
//! - **Download pipeline** ([`download`]): launch, parse progress, reconcile
//!   output, and report through the job event protocol.
//! - **Streaming** ([`stream`]): downloader piped through ffmpeg as
//!   fragmented MP4.

pub mod command;
pub mod download;
pub mod extract;
pub mod process;
pub mod stream;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use download::{
    download_to_file, job_updates, progress_events, DownloadJob, JobPaths, JobRequest, JobUpdate,
    PipelineOptions, YtDlpProgressParser,
};
pub use process::ProcessGuard;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
