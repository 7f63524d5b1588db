//! The progress-reporting download pipeline.
//!
//! One job is one downloader process and one loop reading its output:
//!
//! 1. [`launcher`] starts the process with a deterministic output path.
//! 2. Each output line goes into the [`tail::TailBuffer`] and through a
//!    [`parser::ProgressParser`].
//! 3. Progress values pass through the [`EventEmitter`], which damps them and
//!    enforces event ordering.
//! 4. After exit, [`reconcile`] verifies or repairs the output file.
//! 5. Exactly one terminal event closes the stream.
//!
//! The loop owns all of its state. Dropping the stream at any point kills the
//! downloader's process group and removes partial output. A job that fails
//! on its own keeps whatever it wrote; removing it is left to the caller.

pub mod job;
pub mod launcher;
pub mod parser;
pub mod reconcile;
pub mod tail;

use std::path::PathBuf;

use futures::{Stream, StreamExt};
use mf_core::config::DownloadConfig;
use mf_core::events::{single_line, EventEmitter, JobEvent};
use mf_core::{new_job_id, DownloadError, JobId};
use tokio_util::sync::CancellationToken;

pub use job::{sanitize_filename, JobPaths, JobRequest};
pub use launcher::{launch, LaunchedDownload};
pub use parser::{LineClass, Phase, ProgressParser, YtDlpProgressParser};
pub use reconcile::{reconcile, Reconcile};
pub use tail::TailBuffer;

use crate::process::exit_code;
use crate::tools::ToolRegistry;

/// Room left in an error message for the text preceding the output tail.
const ERROR_PREFIX_RESERVE: usize = 64;

/// Tunables of the pipeline, taken from [`DownloadConfig`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub alternate_extensions: Vec<String>,
    pub tail_max_chars: usize,
    pub tail_snapshot_lines: usize,
    pub error_max_chars: usize,
    pub progress_min_delta: f64,
}

impl From<&DownloadConfig> for PipelineOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            alternate_extensions: config.alternate_extensions.clone(),
            tail_max_chars: config.tail_max_chars,
            tail_snapshot_lines: config.tail_snapshot_lines,
            error_max_chars: config.error_max_chars,
            progress_min_delta: config.progress_min_delta,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl PipelineOptions {
    fn snapshot(&self, tail: &TailBuffer) -> String {
        tail.snapshot(
            self.tail_snapshot_lines,
            self.error_max_chars.saturating_sub(ERROR_PREFIX_RESERVE),
        )
    }

    /// Render a failure as an `error` event message.
    pub fn error_message(&self, err: &DownloadError) -> String {
        single_line(&err.to_string(), self.error_max_chars)
    }
}

/// A single download job, identified before launch.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    id: JobId,
    request: JobRequest,
    paths: JobPaths,
    options: PipelineOptions,
}

impl DownloadJob {
    /// Mint a fresh job for `request`.
    pub fn new(request: JobRequest, paths: JobPaths, options: PipelineOptions) -> Self {
        Self {
            id: new_job_id(),
            request,
            paths,
            options,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    /// Where the verified file will be once the job succeeds.
    pub fn output_path(&self) -> PathBuf {
        self.paths.output_path(&self.id)
    }

    fn alternates(&self) -> Vec<PathBuf> {
        self.options
            .alternate_extensions
            .iter()
            .map(|ext| self.paths.alternate_path(&self.id, ext))
            .collect()
    }
}

/// A protocol event together with the typed cause when it is a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub event: JobEvent,
    pub failure: Option<DownloadError>,
}

impl JobUpdate {
    fn event(event: JobEvent) -> Self {
        Self {
            event,
            failure: None,
        }
    }
}

/// Run a job, yielding every update in protocol order.
///
/// A launch failure yields a single `error`. Otherwise the sequence is
/// `started`, zero or more `progress`, then `done` or `error`.
pub fn job_updates<P>(
    tools: &ToolRegistry,
    job: DownloadJob,
    parser: P,
) -> impl Stream<Item = JobUpdate> + Send + 'static
where
    P: ProgressParser + 'static,
{
    let downloader = launcher::resolve_downloader(tools);
    drive(job, parser, move |job: &DownloadJob| {
        downloader.and_then(|ytdlp| launch(&ytdlp, &job.request, &job.paths, &job.id))
    })
}

/// The job loop over an already resolved launch step.
fn drive<P, L>(job: DownloadJob, parser: P, start: L) -> impl Stream<Item = JobUpdate> + Send + 'static
where
    P: ProgressParser + 'static,
    L: FnOnce(&DownloadJob) -> Result<LaunchedDownload, DownloadError> + Send + 'static,
{
    async_stream::stream! {
        let mut emitter = EventEmitter::new(job.options.progress_min_delta);
        let mut tail = TailBuffer::new(job.options.tail_max_chars);

        if let Err(e) = job.paths.ensure_root().await {
            let err = DownloadError::Unexpected(format!(
                "cannot create {}: {e}",
                job.paths.root().display()
            ));
            if let Some(update) = failure(&job, &mut emitter, err) {
                yield update;
            }
            return;
        }

        let LaunchedDownload { mut guard, mut lines } = match start(&job) {
            Ok(launched) => launched,
            Err(err) => {
                if let Some(update) = failure(&job, &mut emitter, err) {
                    yield update;
                }
                return;
            }
        };

        tracing::info!(
            job_id = %job.id,
            url = job.request.url(),
            format = job.request.format_id(),
            "Download started"
        );
        if let Some(event) = emitter.start() {
            yield JobUpdate::event(event);
        }

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    let err = DownloadError::Unexpected(format!("reading output: {e}"));
                    if let Some(update) = failure(&job, &mut emitter, err) {
                        yield update;
                    }
                    return;
                }
            };
            tail.append(&line);

            let class = parser.classify(&line);
            if let LineClass::Phase(phase) = class {
                tracing::debug!(job_id = %job.id, ?phase, "Download phase");
            }
            if let Some(event) = class.progress().and_then(|p| emitter.progress(p)) {
                yield JobUpdate::event(event);
            }
        }

        let outcome = match guard.wait().await {
            Ok(status) => {
                let expected = job.output_path();
                reconcile(Reconcile {
                    exit_code: exit_code(status),
                    expected: &expected,
                    alternates: job.alternates(),
                    tail: job.options.snapshot(&tail),
                })
                .await
            }
            Err(e) => Err(DownloadError::Unexpected(format!("waiting for downloader: {e}"))),
        };

        match outcome {
            Ok((path, size)) => {
                tracing::info!(job_id = %job.id, path = %path.display(), size, "Download finished");
                if let Some(event) = emitter.done(job.id) {
                    yield JobUpdate::event(event);
                }
            }
            Err(err) => {
                if let Some(update) = failure(&job, &mut emitter, err) {
                    yield update;
                }
            }
        }
    }
}

/// Record a terminal failure: log it and produce the `error` update unless
/// the stream already ended.
fn failure(job: &DownloadJob, emitter: &mut EventEmitter, err: DownloadError) -> Option<JobUpdate> {
    tracing::warn!(job_id = %job.id, kind = err.kind(), "Download failed: {err}");
    let event = emitter.fail(job.options.error_message(&err))?;
    Some(JobUpdate {
        event,
        failure: Some(err),
    })
}

/// Run a job as a stream of protocol events.
pub fn progress_events<P>(
    tools: &ToolRegistry,
    job: DownloadJob,
    parser: P,
) -> impl Stream<Item = JobEvent> + Send + 'static
where
    P: ProgressParser + 'static,
{
    job_updates(tools, job, parser).map(|update| update.event)
}

/// Run a job to completion and return the verified output path.
///
/// `on_event` sees every event as it happens. Cancelling `cancel` stops the
/// job, kills the downloader, and removes partial output.
pub async fn download_to_file(
    tools: &ToolRegistry,
    job: DownloadJob,
    mut on_event: impl FnMut(&JobEvent),
    cancel: Option<CancellationToken>,
) -> mf_core::Result<PathBuf> {
    let output = job.output_path();
    let id = job.id();
    let cancel = cancel.unwrap_or_default();

    let updates = job_updates(tools, job, YtDlpProgressParser);
    tokio::pin!(updates);

    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %id, "Download cancelled");
                return Err(mf_core::Error::Internal("download cancelled".into()));
            }
            update = updates.next() => update,
        };

        let Some(update) = update else {
            return Err(mf_core::Error::Internal(
                "download ended without a result".into(),
            ));
        };
        on_event(&update.event);

        match update {
            JobUpdate { event: JobEvent::Done { .. }, .. } => return Ok(output),
            JobUpdate { failure: Some(err), .. } => return Err(err.into()),
            JobUpdate { event: JobEvent::Error { message }, .. } => {
                return Err(DownloadError::Unexpected(message).into())
            }
            _ => {}
        }
    }
}
