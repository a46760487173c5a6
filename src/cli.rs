use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use max_pain::aggregate::SortKey;
use max_pain::config::{Config, parse_tickers};
use max_pain::fetch_data::source::{DataSourceKind, ExpirationMatch};
use max_pain::pipeline::RunOptions;

/// Max-pain calculator: fetch option chains, find the strike that minimizes
/// holder payout at expiration, and report the directional bias.
#[derive(Parser)]
#[command(name = "max-pain", version, about)]
pub struct Cli {
    /// Log filter (overrides the config file; RUST_LOG overrides both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Acquire option chains for a ticker list and compute max pain
    Run(RunArgs),

    /// Print the date an expiration spec resolves to
    Expiration {
        /// `current_month_third_friday`, `next_month_third_friday`, `next_monthly`, or YYYY-MM-DD
        #[arg(default_value = "next_month_third_friday")]
        spec: String,

        /// Resolve relative to this date instead of today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Print the payout curve for one CSV export
    Curve {
        /// Path to a CBOE option-chain CSV export
        file: PathBuf,

        /// Ticker the export belongs to
        #[arg(long, short = 't')]
        ticker: String,

        /// Expiration spec selecting rows from the export
        #[arg(long, default_value = "next_month_third_friday")]
        expiration: String,

        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Ticker(s) to process; repeatable, comma-separated allowed
    #[arg(long = "ticker", short = 't')]
    pub tickers: Vec<String>,

    /// File with one ticker per line (`#` starts a comment)
    #[arg(long)]
    pub ticker_file: Option<PathBuf>,

    /// JSON config file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub source: Option<DataSourceKind>,

    /// Directory holding CSV exports (manual source)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Re-fetch even when today's snapshot is cached
    #[arg(long)]
    pub overwrite_cache: bool,

    /// Expiration spec (symbolic token or YYYY-MM-DD)
    #[arg(long)]
    pub expiration: Option<String>,

    #[arg(long, value_enum)]
    pub expiration_match: Option<ExpirationMatch>,

    /// Delay between live requests, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Total fetch attempts per ticker
    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,

    /// Acquisition date (defaults to today)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Write the batch result as JSON to this file
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Load the config file and apply command-line overrides on top.
    pub fn into_options(self) -> Result<RunOptions> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(dir) = self.cache_dir {
            config.cache_dir = dir;
        }
        if self.overwrite_cache {
            config.overwrite_cache = true;
        }
        if let Some(spec) = self.expiration {
            config.expiration = spec;
        }
        if let Some(mode) = self.expiration_match {
            config.expiration_match = mode;
        }
        if let Some(ms) = self.delay_ms {
            config.request_delay_ms = ms;
        }
        if let Some(n) = self.max_attempts {
            config.retry.max_attempts = n;
        }
        if let Some(sort) = self.sort {
            config.sort = sort;
        }

        let tickers = parse_tickers(&self.tickers, self.ticker_file.as_deref())?;

        Ok(RunOptions {
            config,
            tickers,
            today: self.today.unwrap_or_else(today),
            output: self.output,
            progress: !self.no_progress,
        })
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
