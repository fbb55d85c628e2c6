//! Document store interface.
//!
//! The engine is connection-agnostic: everything it needs from a store
//! (counting, scrolling scans, bulk writes) goes through [`DocumentStore`].
//! The HTTP implementation lives in [`crate::es`]; tests substitute an
//! in-memory store.
//!
//! Range semantics are fixed across all operations: the window's lower bound
//! is inclusive, the upper bound exclusive, on a field whose values are
//! comparable timestamps.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentWrite, SourceDocument, TimeWindow};

/// One page pulled from a scrolling scan.
#[derive(Debug)]
pub struct ScanPage {
    /// Cursor handle for the next fetch; servers may renew it per page.
    pub handle: String,
    /// Matching documents; empty means the cursor is exhausted.
    pub docs: Vec<SourceDocument>,
}

/// Per-document outcome of a bulk write.
#[derive(Debug, Clone)]
pub struct BulkItemStatus {
    pub id: String,
    /// Rejection reason, when the store refused this write.
    pub error: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Count documents in `index` whose `field` value falls inside `window`.
    /// A `None` field or a fully open window counts everything.
    async fn count(
        &self,
        index: &str,
        doc_type: Option<&str>,
        field: Option<&str>,
        window: &TimeWindow,
    ) -> Result<u64>;

    /// Open a scrolling scan over the same range and return its cursor
    /// handle. Documents begin arriving with the first
    /// [`continue_scan`](DocumentStore::continue_scan).
    async fn open_scan(
        &self,
        index: &str,
        doc_type: Option<&str>,
        field: Option<&str>,
        window: &TimeWindow,
        page_size: usize,
        keep_alive: Duration,
    ) -> Result<String>;

    /// Fetch the next page, renewing the server-side keep-alive.
    async fn continue_scan(&self, handle: &str, keep_alive: Duration) -> Result<ScanPage>;

    /// Release a cursor that is no longer needed.
    async fn clear_scan(&self, handle: &str) -> Result<()>;

    /// Submit one batch of overwrites and report each item's outcome.
    async fn bulk_write(
        &self,
        index: &str,
        doc_type: Option<&str>,
        writes: &[DocumentWrite],
    ) -> Result<Vec<BulkItemStatus>>;
}
