//! Line protocol between a bake worker and the task registry.
//!
//! The worker writes one structured message per line, prefixed with
//! [`BAKE_PREFIX`] and followed by a JSON object tagged by `event`. Every
//! other line it prints (including its own logs) is plain text. The registry
//! classifies each line into a [`ProgressEvent`] with [`classify_line`];
//! classification never fails, it degrades to [`ProgressEvent::Log`].

use serde::{Deserialize, Serialize};

use crate::options::BakeOptions;

/// Prefix that marks a structured worker line.
pub const BAKE_PREFIX: &str = "BAKE ";

// ---------------------------------------------------------------------------
// Worker side
// ---------------------------------------------------------------------------

/// A structured message emitted by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Echo of the fully resolved options.
    Meta(BakeOptions),
    /// Captured `frame` frames out of a nominal `target`.
    Progress { frame: u64, target: u64 },
    /// The bake file was written.
    Done { file: String, frames: u64, fps: f64 },
}

impl WorkerMessage {
    /// Render the message as one protocol line (without the newline).
    pub fn to_line(&self) -> String {
        // Plain structs and numbers only; serde_json writes NaN as `null`.
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("{BAKE_PREFIX}{json}")
    }
}

// ---------------------------------------------------------------------------
// Registry side
// ---------------------------------------------------------------------------

/// A classified event retained in a task log and pushed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Any structured object whose tag is not `progress` or `done`.
    Meta(serde_json::Map<String, serde_json::Value>),
    Progress { pct: u8, frame: u64, target: u64 },
    Done { file: String, frames: u64, fps: f64 },
    Log { line: String },
    /// Worker exit; `code` is `None` when the process died from a signal.
    Exit { code: Option<i32> },
}

impl ProgressEvent {
    /// Event name used on the wire (`event:` field of a server-sent event).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Meta(_) => "meta",
            Self::Progress { .. } => "progress",
            Self::Done { .. } => "done",
            Self::Log { .. } => "log",
            Self::Exit { .. } => "exit",
        }
    }

    /// JSON payload (`data:` field of a server-sent event).
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Meta(map) => serde_json::Value::Object(map.clone()),
            Self::Progress { pct, frame, target } => {
                serde_json::json!({ "pct": pct, "frame": frame, "target": target })
            }
            Self::Done { file, frames, fps } => {
                serde_json::json!({ "file": file, "frames": frames, "fps": fps })
            }
            Self::Log { line } => serde_json::json!({ "line": line }),
            Self::Exit { code } => serde_json::json!({ "code": code }),
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }
}

#[derive(Deserialize)]
struct ProgressReport {
    frame: u64,
    target: u64,
}

#[derive(Deserialize)]
struct DoneReport {
    file: String,
    frames: u64,
    fps: f64,
}

/// Classify one line of worker output.
///
/// Returns `None` for blank lines, which carry nothing worth retaining.
pub fn classify_line(raw: &str) -> Option<ProgressEvent> {
    let line = raw.trim_end();
    if line.is_empty() {
        return None;
    }

    let Some(body) = line.strip_prefix(BAKE_PREFIX) else {
        return Some(log(line));
    };

    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body)
    else {
        return Some(log(line));
    };

    let tag = map
        .get("event")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned();
    let event = match tag.as_str() {
        "progress" => {
            match serde_json::from_value::<ProgressReport>(serde_json::Value::Object(map)) {
                Ok(report) => ProgressEvent::Progress {
                    pct: progress_pct(report.frame, report.target),
                    frame: report.frame,
                    target: report.target,
                },
                Err(_) => log(line),
            }
        }
        "done" => match serde_json::from_value::<DoneReport>(serde_json::Value::Object(map)) {
            Ok(report) => ProgressEvent::Done {
                file: file_url(&report.file),
                frames: report.frames,
                fps: report.fps,
            },
            Err(_) => log(line),
        },
        _ => ProgressEvent::Meta(map),
    };
    Some(event)
}

/// Integer completion percentage, clamped to `0..=100`.
pub fn progress_pct(frame: u64, target: u64) -> u8 {
    let ratio = frame as f64 / target.max(1) as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Normalise a worker-reported file path into a URL path.
///
/// Backslashes become slashes and a leading `./` or `/` is dropped before a
/// single leading `/` is added.
pub fn file_url(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let rel = slashed
        .strip_prefix("./")
        .or_else(|| slashed.strip_prefix('/'))
        .unwrap_or(&slashed);
    format!("/{rel}")
}

fn log(line: &str) -> ProgressEvent {
    ProgressEvent::Log {
        line: line.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
