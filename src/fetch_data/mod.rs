pub mod retry;
pub mod source;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::cache::{CacheKey, SnapshotStore};
use crate::error::ChainError;
use crate::model::{AcquisitionOutcome, AcquisitionStatus, OptionChainSnapshot};
use crate::normalize::normalize;

use retry::RetryPolicy;
use source::OptionSource;

/// What one acquisition pass produced.
#[derive(Debug, Default)]
pub struct AcquisitionReport {
    /// Normalized snapshots, in input ticker order.
    pub snapshots: Vec<OptionChainSnapshot>,
    /// One outcome per input ticker, in input order.
    pub outcomes: Vec<AcquisitionOutcome>,
}

impl AcquisitionReport {
    pub fn count(&self, status: AcquisitionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AcquisitionOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }
}

/// Drives acquisition across a ticker list: cache check, retry, rate-limit
/// delay, normalization. A failing ticker is recorded and the batch moves on.
pub struct Acquirer<S: SnapshotStore> {
    source: Box<dyn OptionSource>,
    store: S,
    retry: RetryPolicy,
    request_delay: Duration,
    overwrite: bool,
    cancel: Option<Arc<AtomicBool>>,
    show_progress: bool,
}

impl<S: SnapshotStore> Acquirer<S> {
    pub fn new(source: Box<dyn OptionSource>, store: S) -> Self {
        Self {
            source,
            store,
            retry: RetryPolicy::default(),
            request_delay: Duration::from_secs(1),
            overwrite: false,
            cancel: None,
            show_progress: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Acquire every ticker for `expiration` as of `as_of`.
    pub async fn run(
        &mut self,
        tickers: &[String],
        as_of: NaiveDate,
        expiration: NaiveDate,
    ) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        let caching = self.source.supports_batch_caching();
        let rate_limited = self.source.is_rate_limited();

        info!(
            source = self.source.name(),
            tickers = tickers.len(),
            %as_of,
            %expiration,
            caching,
            overwrite = self.overwrite,
            "starting acquisition"
        );

        let pb = if self.show_progress {
            ProgressBar::new(tickers.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar().template("  Acquiring [{bar:40}] {pos}/{len} {msg}") {
            pb.set_style(style);
        }

        for (i, ticker) in tickers.iter().enumerate() {
            pb.set_message(ticker.clone());

            if self.cancelled() {
                warn!(%ticker, "interrupted, skipping");
                report
                    .outcomes
                    .push(AcquisitionOutcome::failed(ticker, "interrupted before acquisition"));
                pb.inc(1);
                continue;
            }

            let key = CacheKey::new(ticker, as_of, expiration);

            if caching && !self.overwrite {
                match self.store.load(&key) {
                    Ok(Some(snapshot)) => {
                        info!(%ticker, "using cached snapshot");
                        report.snapshots.push(snapshot);
                        report.outcomes.push(AcquisitionOutcome::cached(ticker));
                        pb.inc(1);
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => warn!(%ticker, error = %format!("{e:#}"), "cache read failed, fetching"),
                }
            }

            let outcome = match self.acquire_one(ticker, &key, as_of, expiration, caching).await {
                Ok(snapshot) => {
                    info!(%ticker, strikes = snapshot.strikes.len(), "fetched");
                    report.snapshots.push(snapshot);
                    AcquisitionOutcome::fetched(ticker)
                }
                Err(e) => {
                    warn!(%ticker, kind = e.kind(), error = %e, "acquisition failed");
                    AcquisitionOutcome::from_error(ticker, &e)
                }
            };
            report.outcomes.push(outcome);
            pb.inc(1);

            let has_next = i + 1 < tickers.len();
            if rate_limited && has_next && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        pb.finish_and_clear();
        info!(
            fetched = report.count(AcquisitionStatus::FetchedNew),
            cached = report.count(AcquisitionStatus::FetchedCached),
            failed = report.count(AcquisitionStatus::Failed),
            "acquisition finished"
        );
        report
    }

    async fn acquire_one(
        &mut self,
        ticker: &str,
        key: &CacheKey,
        as_of: NaiveDate,
        expiration: NaiveDate,
        caching: bool,
    ) -> Result<OptionChainSnapshot, ChainError> {
        let source = self.source.as_ref();
        let raw = self
            .retry
            .run(ticker, move || source.fetch(ticker, expiration))
            .await?;

        let snapshot = match normalize(&raw, ticker, as_of, expiration) {
            Ok(s) => s,
            Err(e) => {
                if caching && matches!(e, ChainError::MalformedChain { .. }) {
                    if let Err(save_err) = self.store.preserve_raw(key, &raw.payload()) {
                        warn!(%ticker, error = %format!("{save_err:#}"), "could not preserve raw payload");
                    }
                }
                return Err(e);
            }
        };

        if caching {
            if let Err(e) = self.store.save(key, &snapshot) {
                warn!(%ticker, error = %format!("{e:#}"), "could not write cache entry");
            }
        }
        Ok(snapshot)
    }
}
