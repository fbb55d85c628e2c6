//! Elasticsearch-flavoured HTTP implementation of [`DocumentStore`].
//!
//! Talks to the store's REST API with `reqwest`: scan-type scroll searches
//! for reading, `_count` for estimates, and NDJSON `_bulk` for writing.
//! The scan requests the store-managed metadata fields (`_parent`,
//! `_timestamp`) alongside `_source` on every page, and bulk action lines
//! carry those values back out when a document has them.
//!
//! # Range queries
//!
//! Window bounds are sent as epoch milliseconds with `gte`/`lt`, matching
//! the half-open `[from, to)` semantics used everywhere else. A missing
//! range field or a fully open window degrades to `match_all`.
//!
//! # Hosts
//!
//! Requests rotate across the configured host list. Scroll handles are
//! cluster-wide, so a continue request may land on a different host than
//! the open that produced it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::models::{DocumentWrite, SourceDocument, TimeWindow};
use crate::store::{BulkItemStatus, DocumentStore, ScanPage};

/// Store-managed parent routing field.
pub const PARENT_FIELD: &str = "_parent";
/// Store-managed per-document timestamp field.
pub const TIMESTAMP_FIELD: &str = "_timestamp";
/// Document body field, requested with every scan page.
const SOURCE_FIELD: &str = "_source";

pub struct EsStore {
    client: reqwest::Client,
    base_urls: Vec<String>,
    next_host: AtomicUsize,
    parent_field: String,
    timestamp_field: String,
}

impl EsStore {
    /// Store over `base_urls` with the default metadata field names.
    pub fn new(client: reqwest::Client, base_urls: Vec<String>) -> Self {
        Self {
            client,
            base_urls,
            next_host: AtomicUsize::new(0),
            parent_field: PARENT_FIELD.to_string(),
            timestamp_field: TIMESTAMP_FIELD.to_string(),
        }
    }

    /// Override the metadata field names. Tests substitute these.
    pub fn with_metadata_fields(mut self, parent: &str, timestamp: &str) -> Self {
        self.parent_field = parent.to_string();
        self.timestamp_field = timestamp.to_string();
        self
    }

    fn base(&self) -> &str {
        let i = self.next_host.fetch_add(1, Ordering::Relaxed);
        &self.base_urls[i % self.base_urls.len()]
    }

    /// `index` or `index/type` path segment.
    fn collection_path(index: &str, doc_type: Option<&str>) -> String {
        match doc_type {
            Some(t) => format!("{}/{}", index, t),
            None => index.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for EsStore {
    async fn count(
        &self,
        index: &str,
        doc_type: Option<&str>,
        field: Option<&str>,
        window: &TimeWindow,
    ) -> Result<u64> {
        let url = format!(
            "{}/{}/_count",
            self.base(),
            Self::collection_path(index, doc_type)
        );
        let body = json!({ "query": build_query(field, window) });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("count request to {} failed", url))?;
        let json = read_json(resp, "count").await?;

        json.get("count")
            .and_then(Value::as_u64)
            .context("count response missing count")
    }

    async fn open_scan(
        &self,
        index: &str,
        doc_type: Option<&str>,
        field: Option<&str>,
        window: &TimeWindow,
        page_size: usize,
        keep_alive: Duration,
    ) -> Result<String> {
        let url = format!(
            "{}/{}/_search?search_type=scan&scroll={}s",
            self.base(),
            Self::collection_path(index, doc_type),
            keep_alive.as_secs()
        );
        let body = json!({
            "query": build_query(field, window),
            "size": page_size,
            "fields": [self.parent_field, SOURCE_FIELD, self.timestamp_field],
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("scan open request to {} failed", url))?;
        let json = read_json(resp, "scan open").await?;

        scroll_id_of(&json)
    }

    async fn continue_scan(&self, handle: &str, keep_alive: Duration) -> Result<ScanPage> {
        let url = format!("{}/_search/scroll", self.base());
        let body = json!({
            "scroll": format!("{}s", keep_alive.as_secs()),
            "scroll_id": handle,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("scan continue request failed")?;
        let json = read_json(resp, "scan continue").await?;

        Ok(ScanPage {
            handle: scroll_id_of(&json)?,
            docs: parse_hits(&json, &self.parent_field, &self.timestamp_field)?,
        })
    }

    async fn clear_scan(&self, handle: &str) -> Result<()> {
        let url = format!("{}/_search/scroll", self.base());
        let body = json!({ "scroll_id": [handle] });

        let resp = self
            .client
            .delete(&url)
            .json(&body)
            .send()
            .await
            .context("scan clear request failed")?;
        if !resp.status().is_success() {
            bail!("scan clear failed (HTTP {})", resp.status());
        }
        Ok(())
    }

    async fn bulk_write(
        &self,
        index: &str,
        doc_type: Option<&str>,
        writes: &[DocumentWrite],
    ) -> Result<Vec<BulkItemStatus>> {
        let url = format!("{}/_bulk", self.base());
        let ndjson = self.render_bulk_body(index, doc_type, writes);

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(ndjson)
            .send()
            .await
            .context("bulk request failed")?;
        let json = read_json(resp, "bulk").await?;

        parse_bulk_items(&json)
    }
}

impl EsStore {
    /// NDJSON bulk body: one action line plus one unmodified source line per
    /// write. `_parent` and `_timestamp` appear on the action line only when
    /// the document carries them.
    fn render_bulk_body(
        &self,
        index: &str,
        doc_type: Option<&str>,
        writes: &[DocumentWrite],
    ) -> String {
        let mut ndjson = String::new();
        for write in writes {
            let mut action = serde_json::Map::new();
            action.insert("_index".to_string(), json!(index));
            if let Some(t) = doc_type {
                action.insert("_type".to_string(), json!(t));
            }
            action.insert("_id".to_string(), json!(write.id));
            if let Some(parent) = &write.parent {
                action.insert(self.parent_field.clone(), json!(parent));
            }
            if let Some(timestamp) = &write.timestamp {
                action.insert(self.timestamp_field.clone(), json!(timestamp));
            }

            ndjson.push_str(&json!({ "index": action }).to_string());
            ndjson.push('\n');
            ndjson.push_str(&write.body.to_string());
            ndjson.push('\n');
        }
        ndjson
    }
}

/// Range query over `field` for a window, or `match_all` when no time
/// filtering applies.
fn build_query(field: Option<&str>, window: &TimeWindow) -> Value {
    match field {
        Some(f) if !window.is_unbounded() => {
            let mut bounds = serde_json::Map::new();
            if let Some(from) = window.from {
                bounds.insert("gte".to_string(), json!(from.timestamp_millis()));
            }
            if let Some(to) = window.to {
                bounds.insert("lt".to_string(), json!(to.timestamp_millis()));
            }
            let mut range = serde_json::Map::new();
            range.insert(f.to_string(), Value::Object(bounds));
            json!({ "range": Value::Object(range) })
        }
        _ => json!({ "match_all": {} }),
    }
}

/// Check the HTTP status and decode the response body as JSON.
async fn read_json(resp: reqwest::Response, what: &str) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!(
            "{} failed (HTTP {}): {}",
            what,
            status,
            body.chars().take(500).collect::<String>()
        );
    }
    resp.json()
        .await
        .with_context(|| format!("{} response was not valid JSON", what))
}

fn scroll_id_of(resp: &Value) -> Result<String> {
    resp.get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .context("scan response missing _scroll_id")
}

/// Decode `hits.hits` into [`SourceDocument`]s.
fn parse_hits(resp: &Value, parent_field: &str, timestamp_field: &str) -> Result<Vec<SourceDocument>> {
    let hits = resp
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .context("scan response missing hits")?;

    hits.iter()
        .map(|hit| parse_hit(hit, parent_field, timestamp_field))
        .collect()
}

fn parse_hit(hit: &Value, parent_field: &str, timestamp_field: &str) -> Result<SourceDocument> {
    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .context("hit missing _id")?
        .to_string();
    let body = hit
        .get(SOURCE_FIELD)
        .cloned()
        .unwrap_or_else(|| json!({}));

    Ok(SourceDocument {
        id,
        body,
        parent: stored_field(hit, parent_field),
        timestamp: stored_field(hit, timestamp_field),
    })
}

/// First value of a stored metadata field, rendered to its string form.
/// Stores return stored fields as single-element arrays; older ones return
/// bare values.
fn stored_field(hit: &Value, name: &str) -> Option<String> {
    let value = hit.get("fields")?.get(name)?;
    let first = match value.as_array() {
        Some(arr) => arr.first()?,
        None => value,
    };
    Some(match first {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Decode per-item outcomes from a bulk response.
fn parse_bulk_items(resp: &Value) -> Result<Vec<BulkItemStatus>> {
    let items = resp
        .get("items")
        .and_then(Value::as_array)
        .context("bulk response missing items")?;

    items
        .iter()
        .map(|item| {
            let op = item
                .get("index")
                .or_else(|| item.get("create"))
                .context("bulk item missing operation")?;
            let id = op
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let error = op.get("error").map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            Ok(BulkItemStatus { id, error })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window(from_day: Option<u32>, to_day: Option<u32>) -> TimeWindow {
        let at = |d: u32| Utc.with_ymd_and_hms(2015, 7, d, 0, 0, 0).unwrap();
        TimeWindow {
            from: from_day.map(at),
            to: to_day.map(at),
        }
    }

    #[test]
    fn bounded_window_builds_half_open_range() {
        let q = build_query(Some("timestamp"), &window(Some(1), Some(2)));
        let range = &q["range"]["timestamp"];
        assert_eq!(range["gte"], json!(1435708800000i64));
        assert_eq!(range["lt"], json!(1435795200000i64));
    }

    #[test]
    fn half_open_window_omits_the_missing_bound() {
        let q = build_query(Some("timestamp"), &window(Some(1), None));
        let range = &q["range"]["timestamp"];
        assert!(range.get("gte").is_some());
        assert!(range.get("lt").is_none());
    }

    #[test]
    fn unbounded_window_matches_all() {
        assert_eq!(
            build_query(Some("timestamp"), &TimeWindow::unbounded()),
            json!({ "match_all": {} })
        );
        assert_eq!(
            build_query(None, &window(Some(1), Some(2))),
            json!({ "match_all": {} })
        );
    }

    #[test]
    fn parses_hits_with_metadata_fields() {
        let resp = json!({
            "_scroll_id": "c2Nhbjs1",
            "hits": { "hits": [
                {
                    "_id": "doc-1",
                    "_source": { "name": "test-name" },
                    "fields": { "_parent": ["parent-1"], "_timestamp": [1437780000000i64] }
                },
                { "_id": "doc-2", "_source": { "name": "other" } }
            ]}
        });

        let docs = parse_hits(&resp, PARENT_FIELD, TIMESTAMP_FIELD).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "doc-1");
        assert_eq!(docs[0].parent.as_deref(), Some("parent-1"));
        assert_eq!(docs[0].timestamp.as_deref(), Some("1437780000000"));
        assert_eq!(docs[0].body["name"], "test-name");
        assert!(docs[1].parent.is_none());
        assert!(docs[1].timestamp.is_none());
    }

    #[test]
    fn stored_field_accepts_bare_values() {
        let hit = json!({ "fields": { "_parent": "parent-2" } });
        assert_eq!(stored_field(&hit, "_parent").as_deref(), Some("parent-2"));
    }

    #[test]
    fn parses_bulk_items_with_mixed_outcomes() {
        let resp = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "ok-1", "status": 200 } },
                { "index": { "_id": "bad-1", "status": 400,
                             "error": { "type": "mapper_parsing_exception", "reason": "failed to parse" } } },
                { "index": { "_id": "bad-2", "status": 400, "error": "MapperParsingException[failed]" } }
            ]
        });

        let items = parse_bulk_items(&resp).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].error.is_none());
        assert!(items[1].error.as_ref().unwrap().contains("failed to parse"));
        assert_eq!(items[2].error.as_deref(), Some("MapperParsingException[failed]"));
    }

    #[test]
    fn bulk_body_carries_metadata_only_when_present() {
        let store = EsStore::new(reqwest::Client::new(), vec!["http://localhost:9200".into()]);
        let writes = vec![
            DocumentWrite {
                id: "child".into(),
                body: json!({"name": "a"}),
                parent: Some("parent-1".into()),
                timestamp: Some("1437780000000".into()),
            },
            DocumentWrite {
                id: "plain".into(),
                body: json!({"name": "b"}),
                parent: None,
                timestamp: None,
            },
        ];

        let ndjson = store.render_bulk_body("testnew", Some("type1"), &writes);
        let lines: Vec<&str> = ndjson.lines().collect();
        assert_eq!(lines.len(), 4);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["index"]["_index"], "testnew");
        assert_eq!(first["index"]["_type"], "type1");
        assert_eq!(first["index"]["_id"], "child");
        assert_eq!(first["index"]["_parent"], "parent-1");
        assert_eq!(first["index"]["_timestamp"], "1437780000000");
        assert_eq!(lines[1], json!({"name": "a"}).to_string());

        let second: Value = serde_json::from_str(lines[2]).unwrap();
        assert!(second["index"].get("_parent").is_none());
        assert!(second["index"].get("_timestamp").is_none());
    }
}
