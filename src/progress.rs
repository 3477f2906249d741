//! Sync progress reporting.
//!
//! Reports observable progress during `fieldval sync` so users see which
//! record is being pushed, what stage it is in, and how much is left.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for sync.
#[derive(Clone, Debug)]
pub enum SyncProgressEvent {
    /// Starting record n of total.
    RecordStarted {
        local_id: String,
        n: u64,
        total: u64,
    },
    /// Named stage within the current record ("uploading images",
    /// "writing document").
    Stage { stage: String, message: String },
    /// The current record finished, successfully or not.
    RecordFinished { local_id: String, ok: bool },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the sync loop.
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress on stderr: "sync 2 / 5  uploading images".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::RecordStarted { local_id, n, total } => {
                format!("sync {} / {}  record {}\n", n, total, local_id)
            }
            SyncProgressEvent::Stage { stage, message } => {
                format!("  {}  {}\n", stage, message)
            }
            SyncProgressEvent::RecordFinished { local_id, ok } => {
                if *ok {
                    format!("  done  {}\n", local_id)
                } else {
                    format!("  failed  {}\n", local_id)
                }
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::RecordStarted { local_id, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "record_started",
                "local_id": local_id,
                "n": n,
                "total": total
            }),
            SyncProgressEvent::Stage { stage, message } => serde_json::json!({
                "event": "progress",
                "phase": "stage",
                "stage": stage,
                "message": message
            }),
            SyncProgressEvent::RecordFinished { local_id, ok } => serde_json::json!({
                "event": "progress",
                "phase": "record_finished",
                "local_id": local_id,
                "ok": ok
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` flag value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode. Caller can pass it to the sync loop.
    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
