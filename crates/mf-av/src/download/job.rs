//! Job identity: request validation, deterministic paths, and the title
//! sidecar.
//!
//! Every file a job touches lives directly under the download root and is
//! named after its [`JobId`], so paths are pure functions of the id and two
//! jobs never share a file.

use std::path::{Path, PathBuf};

use mf_core::config::DownloadConfig;
use mf_core::JobId;

use crate::extract::validate_url;

/// Maximum characters kept from a title when building a download filename.
const MAX_FILENAME_CHARS: usize = 150;

/// A validated download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    url: String,
    format_id: String,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, format_id: impl Into<String>) -> mf_core::Result<Self> {
        let url = url.into().trim().to_string();
        let format_id = format_id.into().trim().to_string();

        validate_url(&url)?;
        if format_id.is_empty() {
            return Err(mf_core::Error::Validation("format_id is required".into()));
        }
        if format_id.starts_with('-') || format_id.contains(char::is_whitespace) {
            return Err(mf_core::Error::Validation(format!(
                "invalid format_id: {format_id}"
            )));
        }

        Ok(Self { url, format_id })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format_id(&self) -> &str {
        &self.format_id
    }

    /// `<format_id>+bestaudio`
    pub fn format_selector(&self) -> String {
        format!("{}+bestaudio", self.format_id)
    }
}

/// Path derivation rooted at the configured download directory.
#[derive(Debug, Clone)]
pub struct JobPaths {
    root: PathBuf,
    merge_format: String,
}

impl JobPaths {
    pub fn new(root: impl Into<PathBuf>, merge_format: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            merge_format: merge_format.into(),
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(&config.dir, &config.merge_format)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn merge_format(&self) -> &str {
        &self.merge_format
    }

    /// Create the download root if needed.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// `<root>/<id>.<merge_format>`, decided before launch.
    pub fn output_path(&self, id: &JobId) -> PathBuf {
        self.alternate_path(id, &self.merge_format)
    }

    /// `<root>/<id>.txt`, holding the title.
    pub fn metadata_path(&self, id: &JobId) -> PathBuf {
        self.root.join(format!("{id}.txt"))
    }

    /// `<root>/<id>.<ext>`
    pub fn alternate_path(&self, id: &JobId, ext: &str) -> PathBuf {
        self.root.join(format!("{id}.{ext}"))
    }

    /// Output template handed to the downloader; it substitutes `%(ext)s`.
    pub fn output_template(&self, id: &JobId) -> String {
        self.root
            .join(format!("{id}.%(ext)s"))
            .to_string_lossy()
            .into_owned()
    }

    /// Persist the title sidecar.
    pub async fn write_title(&self, id: &JobId, title: &str) -> std::io::Result<()> {
        tokio::fs::write(self.metadata_path(id), title.trim()).await
    }

    /// Read the title sidecar, if one was written.
    pub async fn read_title(&self, id: &JobId) -> Option<String> {
        let title = tokio::fs::read_to_string(self.metadata_path(id)).await.ok()?;
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    }

    /// Friendly attachment name: the sanitized title, else the job id.
    pub async fn download_filename(&self, id: &JobId) -> String {
        let stem = self
            .read_title(id)
            .await
            .and_then(|t| sanitize_filename(&t))
            .unwrap_or_else(|| id.to_string());
        format!("{stem}.{}", self.merge_format)
    }

    /// Remove every media artifact of a job (merged output and per-format
    /// intermediates such as `<id>.f137.mp4`), keeping the title sidecar.
    ///
    /// Synchronous so it can run from a `Drop` impl.
    pub fn remove_artifacts(&self, id: &JobId) -> usize {
        let prefix = format!("{id}.");
        let sidecar = self.metadata_path(id);
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_job_file = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix));
            if is_job_file && path != sidecar && std::fs::remove_file(&path).is_ok() {
                tracing::debug!("Removed partial output {}", path.display());
                removed += 1;
            }
        }
        removed
    }
}

/// Strip path separators, reserved characters, and control characters from
/// a title. Returns `None` if nothing usable is left.
pub fn sanitize_filename(title: &str) -> Option<String> {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed: String = collapsed
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    let trimmed = trimmed.trim_end();

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
