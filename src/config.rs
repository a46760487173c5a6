use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::aggregate::SortKey;
use crate::cache::default_cache_dir;
use crate::fetch_data::retry::{Backoff, RetryPolicy};
use crate::fetch_data::source::{DataSourceKind, ExpirationMatch};

/// Run configuration. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: DataSourceKind,
    /// Directory holding CSV exports for the manual source.
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Re-fetch even when a cached snapshot exists.
    pub overwrite_cache: bool,
    /// Pause after each live fetch from a rate-limited source.
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    /// Symbolic token or `YYYY-MM-DD`.
    pub expiration: String,
    pub expiration_match: ExpirationMatch,
    pub sort: SortKey,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Remote,
            data_dir: PathBuf::from("data"),
            cache_dir: default_cache_dir(),
            overwrite_cache: false,
            request_delay_ms: 1000,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
            expiration: "next_month_third_friday".to_string(),
            expiration_match: ExpirationMatch::Nearest,
            sort: SortKey::NetPremiumDesc,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff: Backoff,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            backoff: Backoff::Exponential,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff: self.backoff,
            jitter: self.jitter,
        }
    }
}

impl Config {
    /// Read a JSON config file, or take the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            bail!("retry.jitter must be within 0..=1, got {}", self.retry.jitter);
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Collect tickers from `--ticker` values and an optional ticker file.
///
/// Upper-cased, deduplicated keeping the first occurrence. An empty result is an error.
pub fn parse_tickers(values: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut raw: Vec<String> = values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::to_string)
        .collect();

    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading ticker file {}", path.display()))?;
        raw.extend(
            contents
                .lines()
                .map(|line| line.split('#').next().unwrap_or("").to_string()),
        );
    }

    let mut tickers: Vec<String> = Vec::new();
    for t in raw {
        let t = t.trim().to_uppercase();
        if !t.is_empty() && !tickers.contains(&t) {
            tickers.push(t);
        }
    }

    if tickers.is_empty() {
        bail!("no tickers given; use --ticker or --ticker-file");
    }
    Ok(tickers)
}
