//! Metadata schemas returned by `/api/extract`.
//!
//! The downloader's `-J` dump is loosely typed JSON; these functions pick out
//! the fields the API exposes and derive the list of selectable download
//! options from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One format as reported by the downloader, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub format_id: String,
    pub ext: String,
    pub resolution: Option<String>,
    /// Frames per second, rounded to two decimals.
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// A user-selectable video download (`<format_id>+bestaudio`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadOption {
    /// Display label such as `1920x1080 MP4`.
    pub label: String,
    pub resolution: String,
    pub ext: String,
    /// Video-only format id passed back to `/api/download`.
    pub format_id: String,
    pub fps: Option<f64>,
    pub filesize: Option<u64>,
}

/// Response body of `/api/extract`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
    pub formats: Vec<Format>,
    pub download_options: Vec<DownloadOption>,
}

impl VideoInfo {
    /// Build from the downloader's JSON dump of a single video.
    pub fn from_raw(raw: &Value) -> Self {
        let formats = raw
            .get("formats")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Self {
            id: str_field(raw, "id").unwrap_or_default(),
            title: str_field(raw, "title").unwrap_or_default(),
            duration: size_field(raw, "duration"),
            thumbnail: str_field(raw, "thumbnail"),
            formats: normalize_formats(formats),
            download_options: build_download_options(formats),
        }
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Non-negative integer field; the downloader sometimes reports floats.
fn size_field(v: &Value, key: &str) -> Option<u64> {
    let field = v.get(key)?;
    field.as_u64().or_else(|| {
        field
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.round() as u64)
    })
}

fn has_stream(v: &Value, codec_key: &str) -> bool {
    v.get(codec_key).and_then(Value::as_str) != Some("none")
}

/// Normalize raw format entries, keeping their order.
pub fn normalize_formats(raw: &[Value]) -> Vec<Format> {
    raw.iter()
        .map(|f| Format {
            format_id: str_field(f, "format_id").unwrap_or_default(),
            ext: str_field(f, "ext").unwrap_or_default(),
            resolution: str_field(f, "resolution"),
            fps: f
                .get("fps")
                .and_then(Value::as_f64)
                .map(|fps| (fps * 100.0).round() / 100.0),
            vcodec: str_field(f, "vcodec"),
            acodec: str_field(f, "acodec"),
            filesize: size_field(f, "filesize"),
            filesize_approx: size_field(f, "filesize_approx"),
            has_video: has_stream(f, "vcodec"),
            has_audio: has_stream(f, "acodec"),
        })
        .collect()
}

/// Pick one video format per `(resolution, ext)` pair, preferring the one
/// with the larger approximate size, sorted by ascending height.
pub fn build_download_options(raw: &[Value]) -> Vec<DownloadOption> {
    let mut chosen: Vec<&Value> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for f in raw {
        if !has_stream(f, "vcodec") {
            continue;
        }
        let (Some(resolution), Some(ext)) = (str_field(f, "resolution"), str_field(f, "ext"))
        else {
            continue;
        };
        if resolution.is_empty() || ext.is_empty() {
            continue;
        }

        match index.get(&(resolution.clone(), ext.clone())) {
            Some(&i) => {
                let approx = |v: &Value| size_field(v, "filesize_approx").unwrap_or(0);
                if approx(f) > approx(chosen[i]) {
                    chosen[i] = f;
                }
            }
            None => {
                index.insert((resolution, ext), chosen.len());
                chosen.push(f);
            }
        }
    }

    let mut options: Vec<DownloadOption> = chosen
        .into_iter()
        .map(|f| {
            let resolution = str_field(f, "resolution").unwrap_or_default();
            let ext = str_field(f, "ext").unwrap_or_default();
            DownloadOption {
                label: format!("{resolution} {}", ext.to_uppercase()),
                format_id: str_field(f, "format_id").unwrap_or_default(),
                fps: f.get("fps").and_then(Value::as_f64),
                filesize: size_field(f, "filesize")
                    .filter(|s| *s > 0)
                    .or_else(|| size_field(f, "filesize_approx")),
                resolution,
                ext,
            }
        })
        .collect();

    // Stable, so equal heights keep first-seen order.
    options.sort_by_key(|o| resolution_height(&o.resolution));
    options
}

/// Height from a `WxH` resolution string; 0 when it cannot be parsed.
pub fn resolution_height(resolution: &str) -> u32 {
    resolution
        .split('x')
        .nth(1)
        .and_then(|h| h.trim().parse().ok())
        .unwrap_or(0)
}
