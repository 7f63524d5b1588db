//! Post-exit verification of a download's output file.
//!
//! The downloader picks the final container itself, so the merged file may
//! land under a different extension than requested. The reconciler checks
//! the exit code, finds the file, moves it to the expected path, and rejects
//! empty output.

use std::path::{Path, PathBuf};

use mf_core::DownloadError;

/// Inputs of one reconciliation.
#[derive(Debug, Clone)]
pub struct Reconcile<'a> {
    /// Process exit code; `-1` for signal termination.
    pub exit_code: i32,
    /// Path the job promised to produce.
    pub expected: &'a Path,
    /// Candidate paths in priority order.
    pub alternates: Vec<PathBuf>,
    /// Diagnostics attached to failures.
    pub tail: String,
}

/// Verify (and if needed repair) the output. Returns the final path and its
/// size.
pub async fn reconcile(job: Reconcile<'_>) -> Result<(PathBuf, u64), DownloadError> {
    if job.exit_code != 0 {
        return Err(DownloadError::ProcessExit {
            code: job.exit_code,
            tail: job.tail,
        });
    }

    if !exists(job.expected).await {
        let mut found = None;
        for candidate in &job.alternates {
            if candidate.as_path() != job.expected && exists(candidate).await {
                found = Some(candidate);
                break;
            }
        }

        let Some(found) = found else {
            return Err(DownloadError::OutputMissing { tail: job.tail });
        };

        tracing::info!(
            "Renaming {} to {}",
            found.display(),
            job.expected.display()
        );
        tokio::fs::rename(found, job.expected)
            .await
            .map_err(|e| DownloadError::Unexpected(format!("rename failed: {e}")))?;
    }

    let size = tokio::fs::metadata(job.expected)
        .await
        .map_err(|e| DownloadError::Unexpected(format!("stat failed: {e}")))?
        .len();
    if size == 0 {
        return Err(DownloadError::EmptyOutput);
    }

    Ok((job.expected.to_path_buf(), size))
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn write(&self, name: &str, bytes: &[u8]) {
            std::fs::write(self.path(name), bytes).unwrap();
        }

        fn job(&self) -> (PathBuf, Vec<PathBuf>) {
            let alternates = ["mp4", "mkv", "webm", "m4a"]
                .iter()
                .map(|ext| self.path(&format!("job.{ext}")))
                .collect();
            (self.path("job.mp4"), alternates)
        }
    }

    async fn run(exit_code: i32, expected: &Path, alternates: Vec<PathBuf>) -> Result<(PathBuf, u64), DownloadError> {
        reconcile(Reconcile {
            exit_code,
            expected,
            alternates,
            tail: "last lines".into(),
        })
        .await
    }

    #[tokio::test]
    async fn expected_file_passes() {
        let fx = Fixture::new();
        fx.write("job.mp4", b"data");
        let (expected, alternates) = fx.job();

        let (path, size) = run(0, &expected, alternates).await.unwrap();
        assert_eq!(path, expected);
        assert_eq!(size, 4);
    }

    #[tokio::test]
    async fn mismatched_container_is_renamed() {
        let fx = Fixture::new();
        fx.write("job.mkv", b"matroska");
        let (expected, alternates) = fx.job();

        let (path, size) = run(0, &expected, alternates).await.unwrap();
        assert_eq!(path, expected);
        assert_eq!(size, 8);
        assert!(expected.exists());
        assert!(!fx.path("job.mkv").exists());
    }

    #[tokio::test]
    async fn alternates_probed_in_order() {
        let fx = Fixture::new();
        fx.write("job.webm", b"webm");
        fx.write("job.m4a", b"audio-only");
        let (expected, alternates) = fx.job();

        let (_, size) = run(0, &expected, alternates).await.unwrap();
        assert_eq!(size, 4);
        assert!(fx.path("job.m4a").exists());
    }

    #[tokio::test]
    async fn missing_output() {
        let fx = Fixture::new();
        let (expected, alternates) = fx.job();

        let err = run(0, &expected, alternates).await.unwrap_err();
        assert_eq!(err, DownloadError::OutputMissing { tail: "last lines".into() });
    }

    #[tokio::test]
    async fn empty_output() {
        let fx = Fixture::new();
        fx.write("job.mp4", b"");
        let (expected, alternates) = fx.job();

        let err = run(0, &expected, alternates).await.unwrap_err();
        assert_eq!(err, DownloadError::EmptyOutput);
    }

    #[tokio::test]
    async fn non_zero_exit_wins_over_present_file() {
        let fx = Fixture::new();
        fx.write("job.mp4", b"data");
        let (expected, alternates) = fx.job();

        let err = run(1, &expected, alternates).await.unwrap_err();
        assert_eq!(
            err,
            DownloadError::ProcessExit { code: 1, tail: "last lines".into() }
        );
    }

    #[tokio::test]
    async fn signal_exit_code() {
        let fx = Fixture::new();
        let (expected, alternates) = fx.job();

        let err = run(-1, &expected, alternates).await.unwrap_err();
        assert!(matches!(err, DownloadError::ProcessExit { code: -1, .. }));
    }
}
