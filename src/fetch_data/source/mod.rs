pub mod cboe;
pub mod manual;
pub mod occ;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ChainError;

pub use cboe::CboeSource;
pub use manual::ManualFileSource;

// ── Source-native payloads ──────────────────────────────────────────

/// One listed contract as the remote source reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteContract {
    /// OCC option symbol.
    pub symbol: String,
    pub open_interest: Option<f64>,
}

/// Remote chain filtered down to one expiration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteChain {
    pub ticker: String,
    pub current_price: Option<f64>,
    /// Expiration actually selected from the listed ones.
    pub expiration: NaiveDate,
    pub contracts: Vec<QuoteContract>,
}

/// Raw option-chain data in the shape its source produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum RawChain {
    /// Undecoded quotes response body; decoding happens during normalization so
    /// a rejected body can still be kept.
    QuotesJson {
        body: String,
        expiration_match: ExpirationMatch,
    },
    Quotes(QuoteChain),
    CsvExport { path: PathBuf, text: String },
}

impl RawChain {
    /// Text form kept for offline debugging when normalization rejects it.
    pub fn payload(&self) -> String {
        match self {
            RawChain::QuotesJson { body, .. } => body.clone(),
            RawChain::CsvExport { text, .. } => text.clone(),
            RawChain::Quotes(_) => {
                serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{self:?} ({e})"))
            }
        }
    }
}

// ── Source trait ────────────────────────────────────────────────────

/// A place option chains come from.
#[async_trait]
pub trait OptionSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch one ticker's chain for `expiration`.
    async fn fetch(&self, ticker: &str, expiration: NaiveDate) -> Result<RawChain, ChainError>;

    /// Whether callers may persist normalized output keyed by acquisition date
    /// and skip re-fetching on later runs.
    fn supports_batch_caching(&self) -> bool;

    /// Whether each fetch hits a rate-limited service.
    fn is_rate_limited(&self) -> bool {
        self.supports_batch_caching()
    }
}

// ── Source selection ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    /// CBOE delayed-quotes API
    Remote,
    /// Pre-downloaded CBOE CSV exports in a local directory
    Manual,
}

/// How a requested expiration maps onto the expirations a chain actually lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationMatch {
    Exact,
    Nearest,
    NextAvailable,
}

/// Pick an expiration from `available` (sorted ascending) for `target`.
pub fn select_expiration(
    available: &[NaiveDate],
    target: NaiveDate,
    mode: ExpirationMatch,
) -> Option<NaiveDate> {
    match mode {
        ExpirationMatch::Exact => available.iter().copied().find(|d| *d == target),
        // min_by_key keeps the first minimum, so the earlier date wins a tie
        ExpirationMatch::Nearest => available
            .iter()
            .copied()
            .min_by_key(|d| (*d - target).num_days().abs()),
        ExpirationMatch::NextAvailable => available
            .iter()
            .copied()
            .find(|d| *d >= target)
            .or_else(|| available.last().copied()),
    }
}

/// Build the configured source.
pub fn build_source(config: &Config) -> Result<Box<dyn OptionSource>> {
    match config.source {
        DataSourceKind::Remote => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .user_agent(concat!("max-pain/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("creating HTTP client")?;
            Ok(Box::new(CboeSource::new(client, config.expiration_match)))
        }
        DataSourceKind::Manual => Ok(Box::new(ManualFileSource::new(config.data_dir.clone()))),
    }
}
