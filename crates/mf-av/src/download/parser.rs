//! Classification of downloader output lines.
//!
//! The downloader prints one status line per update when run with
//! `--newline`. Only three shapes matter: percentage updates, stage
//! announcements, and everything else.

use std::path::Path;
use std::sync::LazyLock;

use mf_core::events::MERGE_SENTINEL;
use regex::Regex;

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d{1,3}(?:\.\d+)?)%").expect("percent regex")
});

const DESTINATION_PREFIX: &str = "[download] Destination:";
const MERGE_MARKERS: &[&str] = &["[Merger] Merging formats into", "[ffmpeg] Merging formats into"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "opus", "ogg", "aac", "wav", "flac", "weba"];

/// Sub-stage of a merged download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Video,
    Audio,
    Merge,
}

/// Result of classifying one output line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineClass {
    /// A completion percentage in `0..=100`.
    Percent(f64),
    /// A stage announcement.
    Phase(Phase),
    /// Anything else; only kept for diagnostics.
    Noise,
}

impl LineClass {
    /// The progress value to report for this line, if any. The merge stage
    /// reports [`MERGE_SENTINEL`] because real completion is only known once
    /// the output has been verified.
    pub fn progress(&self) -> Option<f64> {
        match self {
            LineClass::Percent(p) => Some(*p),
            LineClass::Phase(Phase::Merge) => Some(MERGE_SENTINEL),
            _ => None,
        }
    }
}

/// Line-local output classifier for one downloader's output format.
pub trait ProgressParser: Send + Sync {
    fn classify(&self, line: &str) -> LineClass;
}

/// Parser for yt-dlp's `--newline` progress output.
#[derive(Debug, Clone, Copy, Default)]
pub struct YtDlpProgressParser;

impl ProgressParser for YtDlpProgressParser {
    fn classify(&self, line: &str) -> LineClass {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(DESTINATION_PREFIX) {
            return LineClass::Phase(destination_phase(rest.trim()));
        }
        if MERGE_MARKERS.iter().any(|m| line.starts_with(m)) {
            return LineClass::Phase(Phase::Merge);
        }

        PERCENT_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|p| (0.0..=100.0).contains(p))
            .map_or(LineClass::Noise, LineClass::Percent)
    }
}

fn destination_phase(path: &str) -> Phase {
    let ext = Path::new(path.trim_matches('"'))
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext {
        Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => Phase::Audio,
        _ => Phase::Video,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str) -> LineClass {
        YtDlpProgressParser.classify(line)
    }

    #[test]
    fn percent_lines() {
        assert_eq!(
            classify("[download]  45.2% of   10.00MiB at    1.00MiB/s ETA 00:05"),
            LineClass::Percent(45.2)
        );
        assert_eq!(classify("[download] 100% of 10.00MiB in 00:00:03"), LineClass::Percent(100.0));
        assert_eq!(classify("[download]   0.0% of ~  3.01MiB"), LineClass::Percent(0.0));
    }

    #[test]
    fn out_of_range_and_malformed_are_noise() {
        assert_eq!(classify("[download] 150.0% of 10MiB"), LineClass::Noise);
        assert_eq!(classify("[download] 1234% of 10MiB"), LineClass::Noise);
        assert_eq!(classify("[download] abc% of 10MiB"), LineClass::Noise);
        assert_eq!(classify("[download] .5% of 10MiB"), LineClass::Noise);
        assert_eq!(classify("45.2%"), LineClass::Noise);
    }

    #[test]
    fn phases() {
        assert_eq!(
            classify("[download] Destination: downloads/abc.f137.mp4"),
            LineClass::Phase(Phase::Video)
        );
        assert_eq!(
            classify("[download] Destination: downloads/abc.f140.m4a"),
            LineClass::Phase(Phase::Audio)
        );
        assert_eq!(
            classify("[Merger] Merging formats into \"downloads/abc.mp4\""),
            LineClass::Phase(Phase::Merge)
        );
        assert_eq!(
            classify("[ffmpeg] Merging formats into \"downloads/abc.mkv\""),
            LineClass::Phase(Phase::Merge)
        );
    }

    #[test]
    fn everything_else_is_noise() {
        for line in [
            "",
            "[youtube] abc: Downloading webpage",
            "[info] abc: Downloading 1 format(s): 137+140",
            "WARNING: something odd",
            "ERROR: Video unavailable",
            "Deleting original file downloads/abc.f137.mp4",
        ] {
            assert_eq!(classify(line), LineClass::Noise, "{line}");
        }
    }

    #[test]
    fn merge_reports_sentinel() {
        assert_eq!(LineClass::Phase(Phase::Merge).progress(), Some(MERGE_SENTINEL));
        assert_eq!(LineClass::Phase(Phase::Audio).progress(), None);
        assert_eq!(LineClass::Percent(12.5).progress(), Some(12.5));
        assert_eq!(LineClass::Noise.progress(), None);
    }

    #[test]
    fn percent_always_in_range() {
        for n in 0..=1000 {
            let line = format!("[download] {}.{}% of 1MiB", n / 10 * 3, n % 10);
            if let LineClass::Percent(p) = classify(&line) {
                assert!((0.0..=100.0).contains(&p), "{line} -> {p}");
            }
        }
    }
}
