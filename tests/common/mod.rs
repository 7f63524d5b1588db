//! Shared test harness for integration tests.
//!
//! [`TestHarness`] owns a temporary directory holding the download root and
//! a fake `yt-dlp` shell script, and builds an [`AppContext`] pointing at
//! both. [`TestHarness::with_server`] starts Axum on a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use mf_core::config::Config;
use mf_server::context::AppContext;
use mf_server::router::build_router;
use tempfile::TempDir;

/// Title reported by the fake downloader's JSON dump.
pub const FAKE_TITLE: &str = "Test Video: Part 1";

/// Behaviour of the fake downloader when asked to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    /// Progress lines, a merge line, then a non-empty `.mp4`.
    Success,
    /// Writes `.mkv` even though `.mp4` was requested.
    WrongExtension,
    /// Exits 0 after writing an empty file.
    EmptyOutput,
    /// Prints an error and exits 1.
    Fail,
    /// Writes a partial file, reports 10%, then hangs.
    Hang,
}

impl FakeMode {
    fn as_str(self) -> &'static str {
        match self {
            FakeMode::Success => "success",
            FakeMode::WrongExtension => "mkv",
            FakeMode::EmptyOutput => "empty",
            FakeMode::Fail => "fail",
            FakeMode::Hang => "hang",
        }
    }
}

const FAKE_INFO_JSON: &str = r#"{"id":"abc123","title":"Test Video: Part 1","duration":12.4,"thumbnail":"https://img.example.com/t.jpg","formats":[{"format_id":"140","ext":"m4a","vcodec":"none","acodec":"mp4a.40.2","filesize":1000},{"format_id":"136","ext":"mp4","resolution":"1280x720","fps":30,"vcodec":"avc1","acodec":"none","filesize_approx":5000},{"format_id":"137","ext":"mp4","resolution":"1920x1080","fps":30,"vcodec":"avc1","acodec":"none","filesize_approx":9000},{"format_id":"247","ext":"webm","resolution":"1280x720","fps":30,"vcodec":"vp9","acodec":"none"}]}"#;

/// Write an executable fake `yt-dlp` into `dir`.
#[cfg(unix)]
pub fn write_fake_ytdlp(dir: &Path, mode: FakeMode) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
MODE="{mode}"
out=""
prev=""
for a in "$@"; do
  if [ "$a" = "--version" ]; then
    echo "2025.01.01"
    exit 0
  fi
  if [ "$a" = "-J" ]; then
    cat <<'EOF'
{json}
EOF
    exit 0
  fi
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done

if [ "$MODE" = "fail" ]; then
  echo "[youtube] abc123: Downloading webpage"
  echo "ERROR: [youtube] abc123: Video unavailable" >&2
  exit 1
fi

ext=mp4
if [ "$MODE" = "mkv" ]; then ext=mkv; fi
target=$(printf '%s' "$out" | sed "s/%(ext)s/$ext/")
echo "[download] Destination: $target"

if [ "$MODE" = "hang" ]; then
  printf 'partial' > "$target"
  echo "[download]  10.0% of 1.00MiB at 1.00MiB/s ETA 00:09"
  exec sleep 30
fi

for p in 0.0 0.05 12.5 12.5 50.0 87.3 99.0; do
  echo "[download]  $p% of 1.00MiB at 1.00MiB/s ETA 00:00"
done
echo "[Merger] Merging formats into \"$target\""
if [ "$MODE" = "empty" ]; then
  : > "$target"
else
  printf 'fake media payload' > "$target"
fi
exit 0
"#,
        mode = mode.as_str(),
        json = FAKE_INFO_JSON,
    );

    let path = dir.join("yt-dlp");
    std::fs::write(&path, script).expect("failed to write fake yt-dlp");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod fake yt-dlp");
    path
}

/// Test harness wrapping an [`AppContext`] whose downloads land in a
/// temporary directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub config: Config,
    pub dir: TempDir,
}

impl TestHarness {
    /// Harness with a fake downloader behaving as `mode`.
    #[cfg(unix)]
    pub fn new(mode: FakeMode) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.tools.ytdlp_path = Some(write_fake_ytdlp(dir.path(), mode));
        Self::with_config(config, dir)
    }

    /// Harness with a custom configuration; the download root is forced into
    /// `dir`.
    pub fn with_config(mut config: Config, dir: TempDir) -> Self {
        config.downloads.dir = dir.path().join("downloads");
        let ctx = AppContext::new(config.clone());
        Self { ctx, config, dir }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.config.downloads.dir.clone()
    }

    /// Names of every file currently in the download root.
    pub fn download_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.downloads_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .collect();
        names.sort();
        names
    }

    /// Start an Axum server on a random port.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Harness plus running server, with a fake downloader behaving as `mode`.
    #[cfg(unix)]
    pub async fn with_server(mode: FakeMode) -> (Self, SocketAddr) {
        Self::new(mode).serve().await
    }
}

/// Collect the `data:` payloads of an SSE body.
pub fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|d| d.trim_start().to_string())
        .collect()
}

/// Progress-route URL for `format_id`.
pub fn progress_url(addr: SocketAddr, format_id: &str) -> String {
    format!(
        "http://{addr}/api/download/progress?url=https%3A%2F%2Fvideos.example.com%2Fwatch%3Fv%3Dabc123&format_id={format_id}"
    )
}
