//! Page-to-bulk rewriting.
//!
//! Converts one scan page into destination overwrites (same ids, parent and
//! timestamp metadata carried through unchanged) and submits them as a
//! single bulk request. Failures never abort the run here: rejected items
//! and whole-page transport errors are recorded in the outcome and the
//! engine moves on to the next page.

use crate::models::{DocumentWrite, SourceDocument, WriteFailure};
use crate::store::DocumentStore;

/// Outcome of rewriting one page.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Writes submitted (page size; zero for an empty page).
    pub attempted: usize,
    /// Writes the destination acknowledged.
    pub written: u64,
    pub failures: Vec<WriteFailure>,
}

pub struct BulkRewriter<'a> {
    store: &'a dyn DocumentStore,
    index: &'a str,
    doc_type: Option<&'a str>,
}

impl<'a> BulkRewriter<'a> {
    pub fn new(store: &'a dyn DocumentStore, index: &'a str, doc_type: Option<&'a str>) -> Self {
        Self {
            store,
            index,
            doc_type,
        }
    }

    /// Rewrite one page into the destination. An empty page is a no-op and
    /// sends no request.
    pub async fn rewrite(&self, page: &[SourceDocument]) -> BatchOutcome {
        if page.is_empty() {
            return BatchOutcome::default();
        }

        let writes = build_writes(page);
        match self
            .store
            .bulk_write(self.index, self.doc_type, &writes)
            .await
        {
            Ok(statuses) => {
                let mut outcome = BatchOutcome {
                    attempted: writes.len(),
                    ..Default::default()
                };
                for status in statuses {
                    match status.error {
                        Some(reason) => outcome.failures.push(WriteFailure {
                            id: Some(status.id),
                            reason,
                        }),
                        None => outcome.written += 1,
                    }
                }
                outcome
            }
            Err(e) => BatchOutcome {
                attempted: writes.len(),
                written: 0,
                failures: vec![WriteFailure {
                    id: None,
                    reason: format!("bulk request failed: {e:#}"),
                }],
            },
        }
    }
}

/// One overwrite per source document, keyed by the same id. A present parent
/// or timestamp value is propagated unchanged; absence omits the field.
pub fn build_writes(page: &[SourceDocument]) -> Vec<DocumentWrite> {
    page.iter()
        .map(|doc| DocumentWrite {
            id: doc.id.clone(),
            body: doc.body.clone(),
            parent: doc.parent.clone(),
            timestamp: doc.timestamp.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, parent: Option<&str>, timestamp: Option<&str>) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            body: json!({"name": "test-name", "filename": "test-file.pdf"}),
            parent: parent.map(str::to_string),
            timestamp: timestamp.map(str::to_string),
        }
    }

    #[test]
    fn writes_reuse_the_source_id() {
        let writes = build_writes(&[doc("a", None, None), doc("b", None, None)]);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].id, "a");
        assert_eq!(writes[1].id, "b");
    }

    #[test]
    fn parent_is_carried_through_unchanged() {
        let writes = build_writes(&[doc("child", Some("parent-1"), None)]);
        assert_eq!(writes[0].parent.as_deref(), Some("parent-1"));
        assert!(writes[0].timestamp.is_none());
    }

    #[test]
    fn timestamp_is_carried_through_unchanged() {
        let writes = build_writes(&[doc("a", None, Some("1437780000000"))]);
        assert_eq!(writes[0].timestamp.as_deref(), Some("1437780000000"));
        assert!(writes[0].parent.is_none());
    }

    #[test]
    fn absent_metadata_stays_absent() {
        let writes = build_writes(&[doc("a", None, None)]);
        assert!(writes[0].parent.is_none());
        assert!(writes[0].timestamp.is_none());
    }

    #[test]
    fn body_is_not_transformed() {
        let source = doc("a", None, None);
        let writes = build_writes(std::slice::from_ref(&source));
        assert_eq!(writes[0].body, source.body);
    }
}
