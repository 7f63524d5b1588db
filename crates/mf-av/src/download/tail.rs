//! Bounded window of recent downloader output, used to explain failures.

use std::collections::VecDeque;

/// Recent output lines, bounded by total character count.
#[derive(Debug, Clone)]
pub struct TailBuffer {
    lines: VecDeque<String>,
    chars: usize,
    max_chars: usize,
}

impl TailBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            chars: 0,
            max_chars,
        }
    }

    /// Append a line, evicting the oldest lines while over the cap. A single
    /// line longer than the cap is kept as its last `max_chars` characters.
    pub fn append(&mut self, line: &str) {
        let len = line.chars().count();
        let line = if len > self.max_chars {
            line.chars().skip(len - self.max_chars).collect()
        } else {
            line.to_string()
        };

        self.chars += line.chars().count();
        self.lines.push_back(line);

        while self.chars > self.max_chars {
            match self.lines.pop_front() {
                Some(old) => self.chars -= old.chars().count(),
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total characters currently held.
    pub fn char_count(&self) -> usize {
        self.chars
    }

    /// The last `n` lines on one line (newlines become spaces), cut to
    /// `budget` characters keeping the most recent text.
    pub fn snapshot(&self, n: usize, budget: usize) -> String {
        let start = self.lines.len().saturating_sub(n);
        let joined = self
            .lines
            .iter()
            .skip(start)
            .map(|l| l.trim_end_matches(['\r', '\n']))
            .collect::<Vec<_>>()
            .join(" ")
            .replace(['\r', '\n'], " ");
        let joined = joined.trim();

        let count = joined.chars().count();
        if count <= budget {
            joined.to_string()
        } else {
            joined.chars().skip(count - budget).collect()
        }
    }
}
