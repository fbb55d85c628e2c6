//! Core data types that flow through the reindexing pipeline.
//!
//! These types represent the time windows, documents, writes, and run
//! outcomes exchanged between the planner, the scan cursor, the bulk
//! rewriter, and the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Half-open time range `[from, to)` bounding one scan-and-write pass.
///
/// An absent bound means "no filtering" on that side; a window with both
/// bounds absent copies the whole collection in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window with no time filtering at all.
    pub fn unbounded() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = |b: &Option<DateTime<Utc>>| match b {
            Some(t) => t.to_rfc3339(),
            None => "*".to_string(),
        };
        write!(f, "[{}, {})", bound(&self.from), bound(&self.to))
    }
}

/// One document pulled from the source scan.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    /// Document body as stored, field order preserved.
    pub body: serde_json::Value,
    /// Parent routing id, when the document has a parent relationship.
    pub parent: Option<String>,
    /// Store-managed timestamp value, in its wire string form.
    pub timestamp: Option<String>,
}

/// One overwrite operation destined for the target collection.
///
/// Keyed by the source document's id: re-running a copy rewrites the same
/// destination documents rather than appending new ones.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub id: String,
    pub body: serde_json::Value,
    pub parent: Option<String>,
    pub timestamp: Option<String>,
}

/// A recorded write failure.
///
/// `id` names the rejected document for item-level failures; a page whose
/// whole bulk request could not be submitted is recorded with `id: None`.
#[derive(Debug, Clone, Serialize)]
pub struct WriteFailure {
    pub id: Option<String>,
    pub reason: String,
}

/// Accumulated result of one `run` invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReindexOutcome {
    /// Documents streamed out of the source scan across all windows.
    pub documents_found: u64,
    /// Documents the destination acknowledged.
    pub documents_written: u64,
    /// Windows fully drained. Zero marks the no-match early exit.
    pub windows_processed: u64,
    /// True when the run stopped at a cancellation point.
    pub cancelled: bool,
    /// Every recorded failure, in the order it occurred.
    pub failures: Vec<WriteFailure>,
}

/// Fatal scan failure. Everything copied before the abort is preserved in
/// `partial` so callers can report counts and resume with a narrowed range.
#[derive(Debug, Error)]
#[error("reindex aborted: {reason}")]
pub struct ReindexAborted {
    pub reason: String,
    pub partial: ReindexOutcome,
}
