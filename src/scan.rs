//! Scrolling scan cursor over one time window.
//!
//! Wraps the store's scroll mechanics: one open request per window, then
//! repeated continue requests that each renew the server-side keep-alive,
//! until an empty page signals exhaustion. Transport and query errors are
//! fatal for the current run and propagate to the engine; retries, if any,
//! are the caller's responsibility.

use std::time::Duration;

use anyhow::Result;

use crate::models::{SourceDocument, TimeWindow};
use crate::store::DocumentStore;

pub struct ScanCursor<'a> {
    store: &'a dyn DocumentStore,
    handle: String,
    keep_alive: Duration,
}

impl<'a> ScanCursor<'a> {
    /// Open a cursor for `window`'s range query. The first documents arrive
    /// with the first [`next_page`](ScanCursor::next_page) call.
    pub async fn open(
        store: &'a dyn DocumentStore,
        index: &str,
        doc_type: Option<&str>,
        field: Option<&str>,
        window: &TimeWindow,
        page_size: usize,
        keep_alive: Duration,
    ) -> Result<ScanCursor<'a>> {
        let handle = store
            .open_scan(index, doc_type, field, window, page_size, keep_alive)
            .await?;
        Ok(Self {
            store,
            handle,
            keep_alive,
        })
    }

    /// Next page of documents; empty means the scan is exhausted. Every call
    /// renews the keep-alive, so a slow downstream write cannot expire the
    /// cursor between pages.
    pub async fn next_page(&mut self) -> Result<Vec<SourceDocument>> {
        let page = self
            .store
            .continue_scan(&self.handle, self.keep_alive)
            .await?;
        self.handle = page.handle;
        Ok(page.docs)
    }

    /// Release the server-side cursor. Best-effort: a handle that already
    /// expired is not an error worth surfacing.
    pub async fn release(self) {
        let _ = self.store.clear_scan(&self.handle).await;
    }
}
