//! External tool detection.
//!
//! The [`ToolRegistry`] resolves the downloader (`yt-dlp`) and the transcoder
//! (`ffmpeg`) once at startup, honouring path overrides from
//! [`mf_core::config::ToolsConfig`] and falling back to `PATH`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The media downloader.
pub const YTDLP: &str = "yt-dlp";
/// The transcoder used by the streaming path.
pub const FFMPEG: &str = "ffmpeg";

const KNOWN_TOOLS: &[&str] = &[YTDLP, FFMPEG];

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Availability information returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of the tool's version output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Registry of discovered tools.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Resolve every known tool.
    ///
    /// A configured path is used when it exists; otherwise the tool is looked
    /// up in `PATH` with [`which::which`]. Missing tools are left out and
    /// reported by [`ToolRegistry::require`] when first needed.
    pub fn discover(tools_config: &mf_core::config::ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                YTDLP => tools_config.ytdlp_path.as_deref(),
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!("Configured {name} path {} does not exist", p.display());
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!("Resolved {name} at {}", path.display());
                    tools.insert(
                        name.to_string(),
                        ToolConfig {
                            name: name.to_string(),
                            path,
                        },
                    );
                }
                None => tracing::warn!("{name} not found in PATH"),
            }
        }

        Self { tools }
    }

    /// Look up a tool, or fail with [`mf_core::Error::Tool`].
    pub fn require(&self, name: &str) -> mf_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            mf_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Probe every known tool for availability and version.
    ///
    /// Runs `<tool> --version` synchronously; call from a blocking context.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(name, &cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = if name == FFMPEG { "-version" } else { "--version" };

    let output = std::process::Command::new(path)
        .arg(version_arg)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::config::ToolsConfig;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // Nothing is guaranteed to be installed; the call must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require(YTDLP).unwrap_err();
        assert!(matches!(err, mf_core::Error::Tool { .. }));
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn check_all_lists_known_tools() {
        let infos = ToolRegistry::default().check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec![YTDLP, FFMPEG]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn configured_path_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-yt-dlp");
        std::fs::write(&fake, "").unwrap();

        let cfg = ToolsConfig {
            ytdlp_path: Some(fake.clone()),
            ffmpeg_path: None,
        };
        let registry = ToolRegistry::discover(&cfg);
        assert_eq!(registry.require(YTDLP).unwrap().path, fake);
    }
}
