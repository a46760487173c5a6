use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{AcquisitionOutcome, MaxPainResult, PremiumBias};

/// Ordering applied to a batch's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SortKey {
    /// Largest net premium first
    #[serde(rename = "net_premium")]
    #[value(name = "net_premium")]
    NetPremiumDesc,
    /// Alphabetical by ticker
    #[serde(rename = "ticker")]
    #[value(name = "ticker")]
    TickerAsc,
    /// Largest move to max pain first
    #[serde(rename = "pct_change")]
    #[value(name = "pct_change")]
    PctChangeDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Acquisition,
    Computation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub stage: FailureStage,
    pub error_detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub call_bias: usize,
    pub put_bias: usize,
    pub neutral_bias: usize,
    pub average_pct_change: Option<Decimal>,
}

/// Everything one run produced, handed to reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub as_of_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub results: Vec<MaxPainResult>,
    pub failures: Vec<TickerFailure>,
    pub summary: BatchSummary,
}

/// Collects per-ticker results and failures for one batch. Does no I/O.
pub struct ResultAggregator {
    as_of_date: NaiveDate,
    expiration_date: NaiveDate,
    tickers: Vec<String>,
    results: Vec<MaxPainResult>,
    failures: Vec<TickerFailure>,
}

impl ResultAggregator {
    /// `tickers` fixes the requested count and the default ordering.
    pub fn new(as_of_date: NaiveDate, expiration_date: NaiveDate, tickers: &[String]) -> Self {
        Self {
            as_of_date,
            expiration_date,
            tickers: tickers.iter().map(|t| t.to_uppercase()).collect(),
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: MaxPainResult) {
        self.results.push(result);
    }

    pub fn add_failure(&mut self, ticker: &str, stage: FailureStage, error_detail: impl Into<String>) {
        self.failures.push(TickerFailure {
            ticker: ticker.to_string(),
            stage,
            error_detail: error_detail.into(),
        });
    }

    /// Record the failed acquisition outcomes.
    pub fn add_outcomes(&mut self, outcomes: &[AcquisitionOutcome]) {
        for outcome in outcomes.iter().filter(|o| o.is_failed()) {
            let detail = outcome
                .error_detail
                .clone()
                .unwrap_or_else(|| "unknown acquisition failure".to_string());
            self.add_failure(&outcome.ticker, FailureStage::Acquisition, detail);
        }
    }

    pub fn finish(self, sort: SortKey) -> BatchResult {
        let position = |ticker: &str| {
            let ticker = ticker.to_uppercase();
            self.tickers
                .iter()
                .position(|t| *t == ticker)
                .unwrap_or(usize::MAX)
        };

        let mut results = self.results;
        results.sort_by_key(|r| position(&r.ticker));
        sort_results(&mut results, sort);

        let mut failures = self.failures;
        failures.sort_by_key(|f| position(&f.ticker));

        let summary = summarize(self.tickers.len(), &results, &failures);
        BatchResult {
            as_of_date: self.as_of_date,
            expiration_date: self.expiration_date,
            results,
            failures,
            summary,
        }
    }
}

/// Stable sort: equal keys keep their current relative order.
pub fn sort_results(results: &mut [MaxPainResult], key: SortKey) {
    match key {
        SortKey::NetPremiumDesc => results.sort_by(|a, b| b.net_premium.cmp(&a.net_premium)),
        SortKey::TickerAsc => results.sort_by(|a, b| a.ticker.cmp(&b.ticker)),
        SortKey::PctChangeDesc => results.sort_by(|a, b| b.pct_change.cmp(&a.pct_change)),
    }
}

fn summarize(requested: usize, results: &[MaxPainResult], failures: &[TickerFailure]) -> BatchSummary {
    let count = |bias: PremiumBias| results.iter().filter(|r| r.premium_bias == bias).count();

    let average_pct_change = if results.is_empty() {
        None
    } else {
        results
            .iter()
            .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.pct_change))
            .and_then(|total| total.checked_div(Decimal::from(results.len())))
            .map(|avg| avg.round_dp(4))
    };

    BatchSummary {
        requested,
        succeeded: results.len(),
        failed: failures.len(),
        call_bias: count(PremiumBias::Call),
        put_bias: count(PremiumBias::Put),
        neutral_bias: count(PremiumBias::Neutral),
        average_pct_change,
    }
}

impl BatchResult {
    pub fn print_table(&self) {
        println!("\n{}", "═".repeat(104));
        println!(
            "  Max Pain  (as of {}, expiration {})",
            self.as_of_date, self.expiration_date
        );
        println!("{}", "═".repeat(104));
        println!(
            "  {:<8} {:>10} {:>10} {:>8} {:>16} {:>8} {:>12} {:>12} {:>10}",
            "Ticker", "Price", "MaxPain", "Chg%", "Net OI notional", "Bias", "Call OI", "Put OI", "Expiry",
        );
        println!("  {}", "-".repeat(100));
        for r in &self.results {
            println!(
                "  {:<8} {:>10.2} {:>10.2} {:>+8.2} {:>+16} {:>8} {:>12} {:>12} {:>10}",
                r.ticker,
                r.current_price,
                r.max_pain_price,
                r.pct_change,
                r.net_premium,
                r.premium_bias.to_string(),
                r.total_call_oi,
                r.total_put_oi,
                r.expiration_date.format("%m-%d"),
            );
        }
        println!("{}", "═".repeat(104));

        if !self.failures.is_empty() {
            println!("  Failed:");
            for f in &self.failures {
                let stage = match f.stage {
                    FailureStage::Acquisition => "acquisition",
                    FailureStage::Computation => "computation",
                };
                println!("    {:<8} [{}] {}", f.ticker, stage, f.error_detail);
            }
        }

        let s = &self.summary;
        println!(
            "  {} of {} succeeded, {} failed | bias: {} CALL, {} PUT, {} NEUTRAL",
            s.succeeded, s.requested, s.failed, s.call_bias, s.put_bias, s.neutral_bias,
        );
        if let Some(avg) = s.average_pct_change {
            println!("  average move to max pain: {avg:+.2}%");
        }
        println!("  Net OI notional = ITM call OI minus ITM put OI, x100 contracts (not a dollar premium)");
    }
}
