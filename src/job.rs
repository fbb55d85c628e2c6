//! Command orchestration.
//!
//! Resolves connections for the requested target mode, builds the shared
//! engine, runs the command, and prints the stdout summary.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::config::{JobConfig, SCROLL_KEEP_ALIVE};
use crate::connect::connect;
use crate::engine::{ReindexEngine, TargetSpec};
use crate::models::ReindexOutcome;
use crate::progress::{format_number, ProgressMode};
use crate::window::WindowPlan;

/// `reindex estimate`: count the documents the requested range would copy.
pub async fn run_estimate(cfg: &JobConfig, mode: ProgressMode) -> Result<()> {
    let engine = build_engine(cfg, mode).await?;
    let plan = WindowPlan::new(cfg.from, cfg.to, cfg.window_days);
    let count = engine.estimate(&plan.overall()).await?;

    println!("estimate {}", cfg.index);
    println!("  documents in range: {}", format_number(count));
    println!("ok");
    Ok(())
}

/// `reindex run`: the full windowed copy.
pub async fn run_copy(cfg: &JobConfig, mode: ProgressMode) -> Result<()> {
    let engine = build_engine(cfg, mode).await?;

    // Coarse cancellation: ctrl-c sets the flag and the engine stops at the
    // next page or window boundary.
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let started = Instant::now();
    match engine.run(cfg.from, cfg.to, cfg.window_days).await {
        Ok(outcome) => {
            print_summary(cfg, &outcome, started);
            println!("ok");
            Ok(())
        }
        Err(aborted) => {
            // Partial counts still get reported before the error surfaces.
            print_summary(cfg, &aborted.partial, started);
            Err(aborted.into())
        }
    }
}

fn print_summary(cfg: &JobConfig, outcome: &ReindexOutcome, started: Instant) {
    println!("reindex {} -> {}", cfg.index, cfg.destination_index);
    println!(
        "  documents found: {}",
        format_number(outcome.documents_found)
    );
    println!(
        "  documents written: {}",
        format_number(outcome.documents_written)
    );
    println!("  windows processed: {}", outcome.windows_processed);
    if outcome.cancelled {
        println!("  cancelled: yes");
    }
    if !outcome.failures.is_empty() {
        println!("  failures: {}", outcome.failures.len());
        for failure in &outcome.failures {
            match &failure.id {
                Some(id) => println!("    {}: {}", id, failure.reason),
                None => println!("    (page): {}", failure.reason),
            }
        }
    }
    println!("  elapsed: {:?}", started.elapsed());
}

async fn build_engine(cfg: &JobConfig, mode: ProgressMode) -> Result<ReindexEngine> {
    let spec = TargetSpec {
        source_index: cfg.index.clone(),
        destination_index: cfg.destination_index.clone(),
        doc_type: cfg.doc_type.clone(),
        field: cfg.field.clone(),
        batch_size: cfg.batch_size,
        keep_alive: SCROLL_KEEP_ALIVE,
    };

    let source = Arc::new(connect(&cfg.source_hosts, cfg.cluster_name.as_deref()).await?);
    let engine = match &cfg.destination_hosts {
        Some(hosts) => {
            let destination = Arc::new(connect(hosts, None).await?);
            ReindexEngine::inter(source, destination, spec)
        }
        None => ReindexEngine::intra(source, spec),
    };
    Ok(engine.with_progress(mode.reporter()))
}
