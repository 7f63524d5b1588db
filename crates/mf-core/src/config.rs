//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, download, and tool sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub downloads: DownloadConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        let d = &self.downloads;
        if d.alternate_extensions.is_empty() {
            warnings.push(
                "downloads.alternate_extensions is empty; mismatched containers will fail".into(),
            );
        }
        if !d.alternate_extensions.iter().any(|e| *e == d.merge_format) {
            warnings.push(format!(
                "downloads.merge_format '{}' is not listed in alternate_extensions",
                d.merge_format
            ));
        }
        if d.error_max_chars == 0 {
            warnings.push("downloads.error_max_chars is 0; error events will be empty".into());
        }
        if d.tail_max_chars < d.error_max_chars {
            warnings.push(format!(
                "downloads.tail_max_chars ({}) is smaller than error_max_chars ({})",
                d.tail_max_chars, d.error_max_chars
            ));
        }
        if !(0.0..=100.0).contains(&d.progress_min_delta) {
            warnings.push(format!(
                "downloads.progress_min_delta {} is outside 0..=100",
                d.progress_min_delta
            ));
        }

        for (name, path) in [
            ("ytdlp_path", self.tools.ytdlp_path.as_ref()),
            ("ffmpeg_path", self.tools.ffmpeg_path.as_ref()),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} {} does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            static_dir: None,
        }
    }
}

/// Download pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Flat directory holding `<job_id>.<ext>` media and `<job_id>.txt` titles.
    pub dir: PathBuf,
    /// Container requested from the downloader's merger.
    pub merge_format: String,
    /// Extensions probed, in order, when the expected output is missing.
    pub alternate_extensions: Vec<String>,
    /// Character cap of the rolling output tail.
    pub tail_max_chars: usize,
    /// Number of tail lines included in failure diagnostics.
    pub tail_snapshot_lines: usize,
    /// Character budget of an `error` event message.
    pub error_max_chars: usize,
    /// Smallest progress change worth emitting.
    pub progress_min_delta: f64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("downloads"),
            merge_format: "mp4".into(),
            alternate_extensions: ["mp4", "mkv", "webm", "m4a"]
                .into_iter()
                .map(String::from)
                .collect(),
            tail_max_chars: 4000,
            tail_snapshot_lines: 20,
            error_max_chars: 800,
            progress_min_delta: 0.1,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
}
