//! Store connection provisioning.
//!
//! Resolves a comma-separated host list (plus an optional expected cluster
//! name) into a ready [`EsStore`]. Core code receives connected stores,
//! never raw host strings.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use crate::es::EsStore;

/// Default store port when a host string does not name one.
pub const DEFAULT_PORT: u16 = 9200;

/// Build a store over `hosts`. When `cluster_name` is given, the cluster's
/// self-reported name is verified before any copy traffic is sent.
pub async fn connect(hosts: &[String], cluster_name: Option<&str>) -> Result<EsStore> {
    if hosts.is_empty() {
        bail!("at least one host is required");
    }

    let base_urls = hosts
        .iter()
        .map(|h| normalize_host(h))
        .collect::<Result<Vec<_>>>()?;

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    if let Some(expected) = cluster_name {
        verify_cluster(&client, &base_urls, expected).await?;
    }

    Ok(EsStore::new(client, base_urls))
}

/// Normalize one host string into a base URL: scheme defaults to `http`,
/// port to [`DEFAULT_PORT`].
fn normalize_host(host: &str) -> Result<String> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        bail!("empty host in host list");
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = reqwest::Url::parse(&with_scheme)
        .with_context(|| format!("invalid host '{}'", host))?;
    if url.port().is_none() {
        let _ = url.set_port(Some(DEFAULT_PORT));
    }

    Ok(url.to_string().trim_end_matches('/').to_string())
}

/// Ask the cluster for its name and compare against `expected`. The first
/// reachable host answers for the cluster.
async fn verify_cluster(
    client: &reqwest::Client,
    base_urls: &[String],
    expected: &str,
) -> Result<()> {
    let mut last_err = None;

    for base in base_urls {
        let resp = match client.get(format!("{}/", base)).send().await {
            Ok(r) => r,
            Err(e) => {
                last_err = Some(anyhow!("{}: {}", base, e));
                continue;
            }
        };
        if !resp.status().is_success() {
            last_err = Some(anyhow!("{} returned HTTP {}", base, resp.status()));
            continue;
        }

        let info: Value = resp
            .json()
            .await
            .with_context(|| format!("{} returned an invalid cluster info response", base))?;
        let name = info
            .get("cluster_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if name != expected {
            bail!(
                "connected to cluster '{}' at {}, expected '{}'",
                name,
                base,
                expected
            );
        }
        return Ok(());
    }

    Err(last_err
        .unwrap_or_else(|| anyhow!("no hosts to verify"))
        .context("could not verify cluster name"))
}
