use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregate::{BatchResult, FailureStage, ResultAggregator, SortKey};
use crate::cache::{DiskCache, SnapshotStore};
use crate::calendar;
use crate::config::Config;
use crate::engine;
use crate::fetch_data::Acquirer;
use crate::fetch_data::source::{RawChain, build_source};
use crate::normalize::normalize;

/// One batch invocation.
pub struct RunOptions {
    pub config: Config,
    pub tickers: Vec<String>,
    pub today: NaiveDate,
    /// Write the batch as pretty JSON here.
    pub output: Option<PathBuf>,
    pub progress: bool,
}

/// Resolve the expiration, acquire every ticker, compute, and report.
pub fn run(opts: RunOptions) -> Result<BatchResult> {
    let config = &opts.config;
    config.validate()?;

    let expiration = calendar::resolve(&config.expiration, opts.today)
        .context("resolving expiration date")?;
    info!(today = %opts.today, %expiration, tickers = opts.tickers.len(), "run starting");

    let source = build_source(config)?;
    let cache = DiskCache::open(&config.cache_dir)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "could not install interrupt handler");
    }

    let mut acquirer = Acquirer::new(source, cache)
        .with_retry(config.retry.policy())
        .with_request_delay(config.request_delay())
        .with_overwrite(config.overwrite_cache)
        .with_cancel_flag(cancel)
        .with_progress(opts.progress);

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    let batch = rt.block_on(execute(
        &mut acquirer,
        &opts.tickers,
        opts.today,
        expiration,
        config.sort,
    ));

    batch.print_table();

    if let Some(path) = &opts.output {
        write_json(path, &batch)?;
        println!("  Results written to {}", path.display());
    }

    Ok(batch)
}

/// Acquisition then computation for an already-resolved expiration.
///
/// Per-ticker failures in either phase end up in the batch; nothing here aborts.
pub async fn execute<S: SnapshotStore>(
    acquirer: &mut Acquirer<S>,
    tickers: &[String],
    as_of: NaiveDate,
    expiration: NaiveDate,
    sort: SortKey,
) -> BatchResult {
    let report = acquirer.run(tickers, as_of, expiration).await;

    let mut aggregator = ResultAggregator::new(as_of, expiration, tickers);
    aggregator.add_outcomes(&report.outcomes);

    for snapshot in &report.snapshots {
        match engine::compute(snapshot) {
            Ok(result) => aggregator.add_result(result),
            Err(e) => {
                warn!(ticker = %snapshot.ticker, kind = e.kind(), error = %e, "computation failed");
                aggregator.add_failure(&snapshot.ticker, FailureStage::Computation, e.to_string());
            }
        }
    }

    let batch = aggregator.finish(sort);
    info!(
        succeeded = batch.summary.succeeded,
        failed = batch.summary.failed,
        "batch complete"
    );
    batch
}

/// Print the resolved date for an expiration spec.
pub fn expiration(spec: &str, today: NaiveDate) -> Result<()> {
    let date = calendar::resolve(spec, today)?;
    println!("{date}");
    Ok(())
}

/// Print the payout curve for one CSV export.
pub fn curve(file: &Path, ticker: &str, spec: &str, today: NaiveDate) -> Result<()> {
    let expiration = calendar::resolve(spec, today)?;
    let text =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let raw = RawChain::CsvExport {
        path: file.to_path_buf(),
        text,
    };
    let snapshot = normalize(&raw, ticker, today, expiration)?;
    let result = engine::compute(&snapshot)?;
    let points = engine::payout_curve(&snapshot)?;

    println!(
        "\n  {} exp {}  price {:.2}  max pain {:.2}",
        result.ticker, result.expiration_date, result.current_price, result.max_pain_price
    );
    if let Some((low, high)) = snapshot.strike_range() {
        println!("  {} strikes, {low} to {high}", points.len());
    }
    println!("  {}", "-".repeat(66));
    println!(
        "  {:>10} {:>16} {:>16} {:>18}",
        "Strike", "Call payout", "Put payout", "Total"
    );
    for p in &points {
        let marker = if p.strike == result.max_pain_price { " <" } else { "" };
        println!(
            "  {:>10.2} {:>16} {:>16} {:>18}{}",
            p.strike, p.call_payout, p.put_payout, p.total, marker
        );
    }
    Ok(())
}

fn write_json(path: &Path, batch: &BatchResult) -> Result<()> {
    let json = serde_json::to_string_pretty(batch)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
