#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use max_pain::error::ChainError;
use max_pain::fetch_data::source::{OptionSource, QuoteChain, QuoteContract, RawChain};

// ── Dates ────────────────────────────────────────────────────────────

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
}

pub fn expiration() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
}

pub fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ── Chains ───────────────────────────────────────────────────────────

/// Quotes chain expiring 2026-02-20. Rows are `(strike, call_oi, put_oi)`.
pub fn chain(ticker: &str, price: Option<f64>, rows: &[(u32, f64, f64)]) -> RawChain {
    let mut contracts = Vec::new();
    for &(strike, call_oi, put_oi) in rows {
        let thousandths = strike as u64 * 1000;
        contracts.push(QuoteContract {
            symbol: format!("{ticker}260220C{thousandths:08}"),
            open_interest: Some(call_oi),
        });
        contracts.push(QuoteContract {
            symbol: format!("{ticker}260220P{thousandths:08}"),
            open_interest: Some(put_oi),
        });
    }
    RawChain::Quotes(QuoteChain {
        ticker: ticker.to_string(),
        current_price: price,
        expiration: expiration(),
        contracts,
    })
}

/// A small, valid chain.
pub fn liquid(ticker: &str) -> RawChain {
    chain(ticker, Some(15.0), &[(10, 100.0, 0.0), (20, 0.0, 200.0)])
}

// ── Mock source ──────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Reply {
    Chain(RawChain),
    Fail(ChainError),
    /// `SourceUnavailable` for the first `n` calls, then the chain.
    FlakyThen(u32, RawChain),
}

/// Scripted source. Tickers without a reply get `NoDataForTicker`.
pub struct MockSource {
    replies: HashMap<String, Reply>,
    attempts: Mutex<HashMap<String, u32>>,
    calls: Arc<AtomicUsize>,
    caching: bool,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            caching: true,
        }
    }

    pub fn with(mut self, ticker: &str, reply: Reply) -> Self {
        self.replies.insert(ticker.to_string(), reply);
        self
    }

    /// Behave like a local-file source: no caching, no rate limit.
    pub fn uncached(mut self) -> Self {
        self.caching = false;
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl OptionSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, ticker: &str, _expiration: NaiveDate) -> Result<RawChain, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(ticker) {
            None => Err(ChainError::no_data(ticker, "no option chain listed")),
            Some(Reply::Chain(raw)) => Ok(raw.clone()),
            Some(Reply::Fail(e)) => Err(e.clone()),
            Some(Reply::FlakyThen(n, raw)) => {
                let mut attempts = self.attempts.lock().unwrap();
                let seen = attempts.entry(ticker.to_string()).or_default();
                *seen += 1;
                if *seen <= *n {
                    Err(ChainError::unavailable(ticker, "connection reset"))
                } else {
                    Ok(raw.clone())
                }
            }
        }
    }

    fn supports_batch_caching(&self) -> bool {
        self.caching
    }
}
