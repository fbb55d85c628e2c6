//! Reindexing engine.
//!
//! Orchestrates the window planner, the scan cursor, and the bulk rewriter,
//! accumulating counts and recorded failures into one [`ReindexOutcome`].
//! Processing is strictly sequential: windows run newest-to-oldest, a
//! window's cursor fully drains before the next opens, and at most one scan
//! plus one bulk write is in flight at a time. That bounds memory to a
//! single page and keeps write ordering deterministic.
//!
//! Both target variants, intra-location (one connection, different index
//! name) and inter-location (two connections), share this one
//! implementation; only the injected connections differ.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::bulk::BulkRewriter;
use crate::models::{ReindexAborted, ReindexOutcome, TimeWindow};
use crate::progress::{NoProgress, ReindexEvent, ReindexProgress};
use crate::scan::ScanCursor;
use crate::store::DocumentStore;
use crate::window::WindowPlan;

/// Collection configuration shared by both target variants.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub source_index: String,
    pub destination_index: String,
    /// Optional document type filter applied to counts, scans, and writes.
    pub doc_type: Option<String>,
    /// Date field used for windowing; `None` disables time filtering.
    pub field: Option<String>,
    /// Scan page size; one page becomes exactly one bulk request.
    pub batch_size: usize,
    /// Server-side cursor keep-alive, renewed on every page fetch.
    pub keep_alive: Duration,
}

pub struct ReindexEngine {
    source: Arc<dyn DocumentStore>,
    destination: Arc<dyn DocumentStore>,
    spec: TargetSpec,
    progress: Box<dyn ReindexProgress>,
    cancel: Arc<AtomicBool>,
}

impl ReindexEngine {
    /// Copy within a single store to a differently named index.
    pub fn intra(store: Arc<dyn DocumentStore>, spec: TargetSpec) -> Self {
        Self::inter(store.clone(), store, spec)
    }

    /// Copy across two independent store connections.
    pub fn inter(
        source: Arc<dyn DocumentStore>,
        destination: Arc<dyn DocumentStore>,
        spec: TargetSpec,
    ) -> Self {
        Self {
            source,
            destination,
            spec,
            progress: Box::new(NoProgress),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ReindexProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Cancellation flag, checked between windows and between pages. Setting
    /// it requests a coarse stop; an in-flight bulk write completes first.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Count the documents `window` would copy, with the same range
    /// semantics as the scan: lower bound inclusive, upper bound exclusive.
    pub async fn estimate(&self, window: &TimeWindow) -> Result<u64> {
        self.source
            .count(
                &self.spec.source_index,
                self.spec.doc_type.as_deref(),
                self.spec.field.as_deref(),
                window,
            )
            .await
    }

    /// Copy every document in `[from, to)`, one window at a time, newest
    /// first. A zero estimate returns immediately with zero counts and
    /// `windows_processed == 0`, without ever opening a cursor. A fatal scan
    /// error aborts the run; counts accumulated so far travel back in
    /// [`ReindexAborted::partial`].
    pub async fn run(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        window_days: i64,
    ) -> Result<ReindexOutcome, ReindexAborted> {
        let plan = WindowPlan::new(from, to, window_days);
        let mut outcome = ReindexOutcome::default();

        let total = match self.estimate(&plan.overall()).await {
            Ok(n) => n,
            Err(e) => {
                return Err(ReindexAborted {
                    reason: format!("estimate failed: {e:#}"),
                    partial: outcome,
                })
            }
        };
        self.progress
            .report(ReindexEvent::Estimated { documents: total });
        if total == 0 {
            return Ok(outcome);
        }

        for window in plan {
            if self.cancel_requested() {
                self.progress.report(ReindexEvent::Cancelled);
                outcome.cancelled = true;
                break;
            }
            self.progress
                .report(ReindexEvent::WindowStarted { window });

            let drained = match self.copy_window(&window, &mut outcome).await {
                Ok(d) => d,
                Err(e) => {
                    return Err(ReindexAborted {
                        reason: format!("{e:#}"),
                        partial: outcome,
                    })
                }
            };
            if !drained {
                self.progress.report(ReindexEvent::Cancelled);
                outcome.cancelled = true;
                break;
            }
            outcome.windows_processed += 1;
        }

        Ok(outcome)
    }

    /// Drain one window through the destination. Returns `false` when a
    /// cancellation request stopped the drain between pages.
    async fn copy_window(
        &self,
        window: &TimeWindow,
        outcome: &mut ReindexOutcome,
    ) -> Result<bool> {
        let spec = &self.spec;
        let mut cursor = ScanCursor::open(
            self.source.as_ref(),
            &spec.source_index,
            spec.doc_type.as_deref(),
            spec.field.as_deref(),
            window,
            spec.batch_size,
            spec.keep_alive,
        )
        .await?;
        let rewriter = BulkRewriter::new(
            self.destination.as_ref(),
            &spec.destination_index,
            spec.doc_type.as_deref(),
        );

        let mut drained = true;
        loop {
            // A failed continue aborts the run; the handle is left to expire.
            let page = cursor.next_page().await?;
            if page.is_empty() {
                break;
            }
            outcome.documents_found += page.len() as u64;

            let batch = rewriter.rewrite(&page).await;
            outcome.documents_written += batch.written;
            outcome.failures.extend(batch.failures);
            self.progress.report(ReindexEvent::PageFlushed {
                fetched: page.len(),
                written: batch.written,
                total_written: outcome.documents_written,
            });

            if self.cancel_requested() {
                drained = false;
                break;
            }
        }

        cursor.release().await;
        Ok(drained)
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}
