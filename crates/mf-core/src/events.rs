//! Download job event protocol.
//!
//! A progress-tracked job produces an ordered, single-consumer sequence of
//! [`JobEvent`]s: exactly one `started`, any number of damped `progress`
//! updates, and exactly one terminal `done` or `error`. The ordering rules
//! live in a pure [`transition`] function over [`EmitterState`];
//! [`EventEmitter`] is the stateful wrapper the pipeline drives.

use serde::{Deserialize, Serialize};

use crate::ids::JobId;

/// Default smallest progress change worth emitting.
pub const DEFAULT_MIN_DELTA: f64 = 0.1;

/// Progress reported when the merge stage begins. True completion is only
/// known after the process exits and the output file is verified.
pub const MERGE_SENTINEL: f64 = 99.9;

/// Float slack so a one-decimal step (10.0 -> 10.1) is not lost to rounding.
const DELTA_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A single event delivered to the client that requested the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The external process was launched.
    Started,
    /// Best current completion estimate, 0..=100.
    Progress { percent: f64 },
    /// Terminal success; the file is retrievable by job id.
    Done { job_id: JobId },
    /// Terminal failure with a short, newline-free reason.
    Error { message: String },
}

impl JobEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Done { .. } | JobEvent::Error { .. })
    }

    /// Event name as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::Started => "started",
            JobEvent::Progress { .. } => "progress",
            JobEvent::Done { .. } => "done",
            JobEvent::Error { .. } => "error",
        }
    }

    /// Encode as one protocol line: `started`, `progress:42.5`, `done:<id>`,
    /// or `error:<message>`.
    pub fn to_wire(&self) -> String {
        match self {
            JobEvent::Started => "started".to_string(),
            JobEvent::Progress { percent } => format!("progress:{percent:.1}"),
            JobEvent::Done { job_id } => format!("done:{job_id}"),
            JobEvent::Error { message } => format!("error:{}", single_line(message, usize::MAX)),
        }
    }

    /// Decode a protocol line produced by [`JobEvent::to_wire`].
    pub fn from_wire(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "started" {
            return Some(JobEvent::Started);
        }
        let (kind, payload) = line.split_once(':')?;
        match kind {
            "progress" => payload
                .parse::<f64>()
                .ok()
                .filter(|p| (0.0..=100.0).contains(p))
                .map(|percent| JobEvent::Progress { percent }),
            "done" => payload.parse().ok().map(|job_id| JobEvent::Done { job_id }),
            "error" => Some(JobEvent::Error {
                message: payload.to_string(),
            }),
            _ => None,
        }
    }
}

/// Collapse line breaks into spaces and cap the result at `max_chars`,
/// keeping the beginning of the text.
pub fn single_line(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let mut cut: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Position of a job's event stream in `Idle -> Started -> Progress* -> Done | Error`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmitterState {
    /// Nothing sent yet.
    Idle,
    /// `started` sent, no progress yet.
    Started,
    /// At least one progress update sent; `last` is the last emitted value.
    Progress { last: f64 },
    /// `done` sent. Terminal.
    Done,
    /// `error` sent. Terminal.
    Error,
}

impl EmitterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EmitterState::Done | EmitterState::Error)
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// The process launched.
    Launched,
    /// A progress sample, possibly noisy or out of order.
    Sample(f64),
    /// The job succeeded.
    Succeeded(JobId),
    /// The job failed with the given message.
    Failed(String),
}

/// Pure transition function: returns the next state and the event to emit,
/// if any.
///
/// Terminal states absorb every signal without emitting. A failure from
/// `Idle` is allowed (the process never launched); a success from `Idle` and
/// samples before launch are ignored.
pub fn transition(state: EmitterState, signal: Signal, min_delta: f64) -> (EmitterState, Option<JobEvent>) {
    use EmitterState as S;

    if state.is_terminal() {
        return (state, None);
    }

    match (state, signal) {
        (_, Signal::Failed(message)) => (S::Error, Some(JobEvent::Error { message })),
        (S::Idle, Signal::Launched) => (S::Started, Some(JobEvent::Started)),
        (S::Idle, _) => (S::Idle, None),
        (_, Signal::Launched) => (state, None),
        (_, Signal::Succeeded(job_id)) => (S::Done, Some(JobEvent::Done { job_id })),
        (_, Signal::Sample(value)) if value.is_nan() => (state, None),
        (S::Started, Signal::Sample(value)) => {
            let percent = value.clamp(0.0, 100.0);
            (S::Progress { last: percent }, Some(JobEvent::Progress { percent }))
        }
        (S::Progress { last }, Signal::Sample(value)) => {
            let percent = value.clamp(0.0, 100.0);
            if (percent - last).abs() + DELTA_EPSILON >= min_delta || percent >= 100.0 {
                (S::Progress { last: percent }, Some(JobEvent::Progress { percent }))
            } else {
                (state, None)
            }
        }
        (S::Done | S::Error, _) => (state, None),
    }
}

// ---------------------------------------------------------------------------
// EventEmitter
// ---------------------------------------------------------------------------

/// Stateful driver around [`transition`], owned by a single job loop.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    state: EmitterState,
    min_delta: f64,
}

impl EventEmitter {
    /// Create an emitter that suppresses progress changes below `min_delta`.
    pub fn new(min_delta: f64) -> Self {
        Self {
            state: EmitterState::Idle,
            min_delta,
        }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn apply(&mut self, signal: Signal) -> Option<JobEvent> {
        let (next, event) = transition(self.state, signal, self.min_delta);
        self.state = next;
        event
    }

    /// Record the launch; yields `started` once.
    pub fn start(&mut self) -> Option<JobEvent> {
        self.apply(Signal::Launched)
    }

    /// Record a progress sample; yields `progress` unless damped.
    pub fn progress(&mut self, percent: f64) -> Option<JobEvent> {
        self.apply(Signal::Sample(percent))
    }

    /// Record success; yields `done` unless the stream already ended.
    pub fn done(&mut self, job_id: JobId) -> Option<JobEvent> {
        self.apply(Signal::Succeeded(job_id))
    }

    /// Record failure; yields `error` unless the stream already ended.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<JobEvent> {
        self.apply(Signal::Failed(message.into()))
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELTA)
    }
}
