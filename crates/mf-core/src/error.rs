//! Unified error type for the mediafetch application.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].
//! Failures of the progress-download pipeline have their own taxonomy,
//! [`DownloadError`], because each of them becomes a terminal `error` event
//! rather than an HTTP response.

use std::fmt;

/// Terminal failures of a single download job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// The external downloader could not be launched at all.
    #[error("failed to start {tool}: {message}")]
    Startup {
        /// Name of the tool that failed to spawn.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The downloader ran but exited with a non-zero code.
    #[error("downloader exited with code {code}: {tail}")]
    ProcessExit {
        /// Exit code; `-1` when the process was terminated by a signal.
        code: i32,
        /// Snapshot of the most recent output lines.
        tail: String,
    },

    /// The downloader exited cleanly but no output file was found under any
    /// known extension.
    #[error("output file not found after download: {tail}")]
    OutputMissing {
        /// Snapshot of the most recent output lines.
        tail: String,
    },

    /// The output file exists but has zero size.
    #[error("downloaded file is empty")]
    EmptyOutput,

    /// Any other failure while reading or reconciling the job.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl DownloadError {
    /// Short machine-readable tag for logs and API error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadError::Startup { .. } => "startup",
            DownloadError::ProcessExit { .. } => "process_exit",
            DownloadError::OutputMissing { .. } => "output_missing",
            DownloadError::EmptyOutput => "empty_output",
            DownloadError::Unexpected(_) => "unexpected",
        }
    }
}

/// Unified error type covering all failure modes in mediafetch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job", "file").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (yt-dlp, ffmpeg) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A download job failed.
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Download(_) => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
