//! Metadata extraction through the downloader's JSON dump.

use mf_core::media::VideoInfo;
use serde_json::Value;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, YTDLP};

/// Reject URLs that are empty or would be parsed as a command-line option.
pub fn validate_url(url: &str) -> mf_core::Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(mf_core::Error::Validation("url is required".into()));
    }
    if url.starts_with('-') {
        return Err(mf_core::Error::Validation(format!("invalid url: {url}")));
    }
    Ok(())
}

/// Run `yt-dlp -J --no-playlist <url>` and parse its JSON output.
pub async fn extract_info(tools: &ToolRegistry, url: &str) -> mf_core::Result<Value> {
    validate_url(url)?;
    let ytdlp = tools.require(YTDLP)?;

    let output = ToolCommand::new(ytdlp.path.clone())
        .args(["-J", "--no-playlist"])
        .arg(url)
        .execute()
        .await?;

    serde_json::from_str(&output.stdout)
        .map_err(|e| mf_core::Error::tool(YTDLP, format!("invalid JSON output: {e}")))
}

/// Extract and normalize metadata for `/api/extract`.
pub async fn extract(tools: &ToolRegistry, url: &str) -> mf_core::Result<VideoInfo> {
    let raw = extract_info(tools, url).await?;
    let info = VideoInfo::from_raw(&raw);
    tracing::info!(
        video_id = %info.id,
        formats = info.formats.len(),
        options = info.download_options.len(),
        "Extracted metadata"
    );
    Ok(info)
}

/// Best-effort title lookup; failures are logged and yield `None`.
pub async fn fetch_title(tools: &ToolRegistry, url: &str) -> Option<String> {
    match extract_info(tools, url).await {
        Ok(raw) => raw
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned),
        Err(e) => {
            tracing::warn!("Title lookup failed for {url}: {e}");
            None
        }
    }
}
