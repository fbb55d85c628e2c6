//! Configuration resolution and validation.
//!
//! CLI flags resolve into a validated [`JobConfig`] before any network call
//! is made: malformed dates, missing locations, and contradictory flag
//! combinations are all rejected here.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Documents pulled per scroll page and written per bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 500;
/// Temporal window size in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 1;
/// Server-side scroll keep-alive, renewed on every page fetch. No client
/// call uses a shorter timeout, so a slow bulk write cannot starve the
/// cursor.
pub const SCROLL_KEEP_ALIVE: Duration = Duration::from_secs(60);

const DATE_FORMAT: &str = "%Y%m%d";

/// Shared argument set for the `run` and `estimate` subcommands.
#[derive(Debug, Clone, clap::Args)]
pub struct JobArgs {
    /// Comma separated host list of source cluster hosts.
    #[arg(long = "src-host", value_delimiter = ',', required = true)]
    pub src_host: Vec<String>,

    /// Comma separated host list of destination cluster hosts. Absent means
    /// the copy stays within the source cluster.
    #[arg(long = "dst-host", value_delimiter = ',')]
    pub dst_host: Option<Vec<String>>,

    /// Name of the source index.
    #[arg(long, short = 'i')]
    pub index: String,

    /// Name of the destination index. Required when copying within one
    /// cluster; defaults to the source index name when copying across
    /// clusters.
    #[arg(long, short = 'd')]
    pub destination: Option<String>,

    /// Document type to copy.
    #[arg(long = "doc-type", short = 't')]
    pub doc_type: Option<String>,

    /// Name of the date field used for windowing. Absence disables
    /// windowing: the whole index is copied in one pass.
    #[arg(long, short = 'f')]
    pub field: Option<String>,

    /// Start date in yyyyMMdd format (e.g. 20150701), inclusive.
    #[arg(long = "start-date")]
    pub start_date: Option<String>,

    /// End date in yyyyMMdd format (e.g. 20150711), exclusive. Defaults to
    /// the start of the next day.
    #[arg(long = "end-date")]
    pub end_date: Option<String>,

    /// How many documents are pulled from the source per batch.
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Temporal window size in days.
    #[arg(long = "window-days", default_value_t = DEFAULT_WINDOW_DAYS)]
    pub window_days: i64,

    /// Expected name of the source cluster, verified before copying.
    #[arg(long = "cluster-name")]
    pub cluster_name: Option<String>,
}

/// Validated job configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub source_hosts: Vec<String>,
    /// `None` selects the intra-location target (one connection).
    pub destination_hosts: Option<Vec<String>>,
    pub index: String,
    pub destination_index: String,
    pub doc_type: Option<String>,
    pub field: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub batch_size: usize,
    pub window_days: i64,
    pub cluster_name: Option<String>,
}

pub fn resolve(args: &JobArgs) -> Result<JobConfig> {
    if args.batch_size == 0 {
        bail!("batch-size must be at least 1");
    }
    if args.window_days < 1 {
        bail!("window-days must be at least 1");
    }

    let from = match (&args.field, &args.start_date) {
        (Some(_), Some(s)) => Some(parse_date(s)?),
        (Some(_), None) => bail!("--start-date is required when --field is set"),
        (None, Some(_)) => bail!("--start-date has no effect without --field"),
        (None, None) => None,
    };
    let to = match (&args.field, &args.end_date) {
        (Some(_), Some(s)) => Some(parse_date(s)?),
        (None, Some(_)) => bail!("--end-date has no effect without --field"),
        _ => None,
    };
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            bail!(
                "start date {} is after end date {}",
                f.format(DATE_FORMAT),
                t.format(DATE_FORMAT)
            );
        }
    }

    let destination_index = match (&args.dst_host, &args.destination) {
        (None, None) => {
            bail!("--destination is required when copying within one cluster")
        }
        (None, Some(d)) if *d == args.index => bail!(
            "destination index must differ from '{}' when copying within one cluster",
            args.index
        ),
        (None, Some(d)) => d.clone(),
        (Some(_), d) => d.clone().unwrap_or_else(|| args.index.clone()),
    };

    Ok(JobConfig {
        source_hosts: args.src_host.clone(),
        destination_hosts: args.dst_host.clone(),
        index: args.index.clone(),
        destination_index,
        doc_type: args.doc_type.clone(),
        field: args.field.clone(),
        from,
        to,
        batch_size: args.batch_size,
        window_days: args.window_days,
        cluster_name: args.cluster_name.clone(),
    })
}

/// Parse a `yyyyMMdd` date into midnight UTC.
fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("invalid date '{}', expected yyyyMMdd (e.g. 20150701)", s))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args() -> JobArgs {
        JobArgs {
            src_host: vec!["localhost".to_string()],
            dst_host: None,
            index: "test".to_string(),
            destination: Some("testnew".to_string()),
            doc_type: Some("type1".to_string()),
            field: None,
            start_date: None,
            end_date: None,
            batch_size: DEFAULT_BATCH_SIZE,
            window_days: DEFAULT_WINDOW_DAYS,
            cluster_name: None,
        }
    }

    #[test]
    fn parses_compact_dates_as_midnight_utc() {
        let parsed = parse_date("20150725").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2015, 7, 25, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("2015-07-25").is_err());
        assert!(parse_date("20151340").is_err());
    }

    #[test]
    fn intra_mode_requires_a_distinct_destination() {
        let mut a = args();
        a.destination = None;
        assert!(resolve(&a).is_err());

        let mut a = args();
        a.destination = Some("test".to_string());
        assert!(resolve(&a).is_err());
    }

    #[test]
    fn inter_mode_defaults_destination_to_source_name() {
        let mut a = args();
        a.dst_host = Some(vec!["remote".to_string()]);
        a.destination = None;
        let cfg = resolve(&a).unwrap();
        assert_eq!(cfg.destination_index, "test");
    }

    #[test]
    fn windowing_flags_require_a_field() {
        let mut a = args();
        a.start_date = Some("20150701".to_string());
        assert!(resolve(&a).is_err());

        let mut a = args();
        a.end_date = Some("20150711".to_string());
        assert!(resolve(&a).is_err());
    }

    #[test]
    fn field_requires_a_start_date() {
        let mut a = args();
        a.field = Some("timestamp".to_string());
        assert!(resolve(&a).is_err());
    }

    #[test]
    fn start_after_end_is_rejected() {
        let mut a = args();
        a.field = Some("timestamp".to_string());
        a.start_date = Some("20150711".to_string());
        a.end_date = Some("20150701".to_string());
        assert!(resolve(&a).is_err());
    }

    #[test]
    fn open_ended_end_date_stays_open() {
        let mut a = args();
        a.field = Some("timestamp".to_string());
        a.start_date = Some("20150701".to_string());
        let cfg = resolve(&a).unwrap();
        assert!(cfg.from.is_some());
        assert!(cfg.to.is_none());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut a = args();
        a.batch_size = 0;
        assert!(resolve(&a).is_err());
    }
}
