//! # Reindex CLI (`reindex`)
//!
//! Copies documents between two search-index locations (same cluster with a
//! different index, or two different clusters) over a bounded or unbounded
//! time range.
//!
//! ## Usage
//!
//! ```bash
//! reindex run --src-host es1,es2 --index logs --destination logs-v2 \
//!     --doc-type event --field timestamp --start-date 20150701
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `reindex estimate` | Count the documents the requested range would copy |
//! | `reindex run` | Copy documents window by window, newest first |
//!
//! ## Examples
//!
//! ```bash
//! # Same cluster, new index name
//! reindex run --src-host localhost --index test --destination testnew -t type1
//!
//! # Across clusters, windowed by a date field, two-day windows
//! reindex run --src-host old-es --dst-host new-es --index logs \
//!     --field timestamp --start-date 20150701 --end-date 20150711 \
//!     --window-days 2
//!
//! # How much would that copy?
//! reindex estimate --src-host old-es --dst-host new-es --index logs \
//!     --field timestamp --start-date 20150701
//! ```

use anyhow::bail;
use clap::{Parser, Subcommand};

use reindexer::config::{self, JobArgs};
use reindexer::job;
use reindexer::progress::ProgressMode;

/// Reindex: windowed, scroll-based document copying between search indices.
///
/// The copy is resumable (re-invoke with a narrowed end date), memory-bounded
/// (one batch in flight at a time), and preserves parent and timestamp
/// metadata on every document.
#[derive(Parser)]
#[command(
    name = "reindex",
    about = "Windowed, scroll-based document copying between search indices",
    version,
    long_about = "Copies documents between two search-index locations over a bounded or \
    unbounded time range. The requested range is partitioned into temporal windows processed \
    newest-to-oldest; each window is streamed through a scrolling cursor and re-emitted as \
    bulk writes keyed by the source document ids, so re-running a copy overwrites rather \
    than duplicates."
)]
struct Cli {
    /// Progress output on stderr: off, human, or json.
    ///
    /// Defaults to human when stderr is a terminal, otherwise off. The final
    /// summary always goes to stdout.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Count the documents the requested range would copy.
    ///
    /// Uses the same range semantics as the copy itself: the start date is
    /// inclusive, the end date exclusive.
    Estimate {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Copy documents from the source index to the destination.
    ///
    /// Windows are processed newest-to-oldest; a window's cursor fully
    /// drains before the next opens. Individual write rejections are
    /// recorded and reported at the end without aborting the run.
    Run {
        #[command(flatten)]
        job: JobArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mode = match cli.progress.as_deref() {
        None => ProgressMode::default_for_tty(),
        Some("off") => ProgressMode::Off,
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        Some(other) => bail!(
            "unknown progress mode '{}': expected off, human, or json",
            other
        ),
    };

    match cli.command {
        Commands::Estimate { job } => {
            let cfg = config::resolve(&job)?;
            job::run_estimate(&cfg, mode).await?;
        }
        Commands::Run { job } => {
            let cfg = config::resolve(&job)?;
            job::run_copy(&cfg, mode).await?;
        }
    }

    Ok(())
}
