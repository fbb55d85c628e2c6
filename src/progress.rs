//! Reindex progress reporting.
//!
//! Reports observable progress during a copy so users see which window is
//! being drained, how many documents have been written, and when a
//! cancellation request has been picked up. Progress is emitted on
//! **stderr** so stdout remains parseable for the final summary.

use std::io::Write;

use crate::models::TimeWindow;

/// A single progress event for one run.
#[derive(Clone, Debug)]
pub enum ReindexEvent {
    /// The estimate for the overall range completed.
    Estimated { documents: u64 },
    /// A window's scan is starting.
    WindowStarted { window: TimeWindow },
    /// One page was handed to the destination.
    PageFlushed {
        fetched: usize,
        written: u64,
        total_written: u64,
    },
    /// A cancellation request took effect at a window or page boundary.
    Cancelled,
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait ReindexProgress: Send + Sync {
    /// Emit a progress event. Called from the engine between store calls.
    fn report(&self, event: ReindexEvent);
}

/// Human-friendly progress on stderr: "reindex  window [..)  1,234 written".
pub struct StderrProgress;

impl ReindexProgress for StderrProgress {
    fn report(&self, event: ReindexEvent) {
        let line = match &event {
            ReindexEvent::Estimated { documents } => {
                format!("reindex  {} documents in range\n", format_number(*documents))
            }
            ReindexEvent::WindowStarted { window } => {
                format!("reindex  window {}\n", window)
            }
            ReindexEvent::PageFlushed {
                fetched,
                written,
                total_written,
            } => format!(
                "reindex  wrote {} of {} in batch  ({} total)\n",
                format_number(*written),
                format_number(*fetched as u64),
                format_number(*total_written)
            ),
            ReindexEvent::Cancelled => {
                "reindex  cancelled, stopping at the next boundary\n".to_string()
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ReindexProgress for JsonProgress {
    fn report(&self, event: ReindexEvent) {
        let obj = match &event {
            ReindexEvent::Estimated { documents } => serde_json::json!({
                "event": "estimated",
                "documents": documents
            }),
            ReindexEvent::WindowStarted { window } => serde_json::json!({
                "event": "window",
                "from": window.from.map(|t| t.to_rfc3339()),
                "to": window.to.map(|t| t.to_rfc3339())
            }),
            ReindexEvent::PageFlushed {
                fetched,
                written,
                total_written,
            } => serde_json::json!({
                "event": "page",
                "fetched": fetched,
                "written": written,
                "total_written": total_written
            }),
            ReindexEvent::Cancelled => serde_json::json!({
                "event": "cancelled"
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

impl ReindexProgress for NoProgress {
    fn report(&self, _event: ReindexEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
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

    /// Build a reporter for this mode. Caller passes it to the engine.
    pub fn reporter(&self) -> Box<dyn ReindexProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
