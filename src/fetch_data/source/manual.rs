use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::{OptionSource, RawChain};
use crate::error::ChainError;

/// Reads CBOE "download CSV" exports that were saved into a directory by hand.
pub struct ManualFileSource {
    data_dir: PathBuf,
}

impl ManualFileSource {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// `{ticker}_quotedata.csv` if present, else the first CSV (by name) with the ticker as a name token.
    pub fn find_file(&self, ticker: &str) -> Result<PathBuf, ChainError> {
        find_chain_file(&self.data_dir, ticker)
    }
}

#[async_trait]
impl OptionSource for ManualFileSource {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn fetch(&self, ticker: &str, _expiration: NaiveDate) -> Result<RawChain, ChainError> {
        let path = self.find_file(ticker)?;
        debug!(%ticker, path = %path.display(), "reading option chain export");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ChainError::no_data(ticker, format!("reading {}: {e}", path.display())))?;
        Ok(RawChain::CsvExport { path, text })
    }

    fn supports_batch_caching(&self) -> bool {
        false
    }
}

fn find_chain_file(dir: &Path, ticker: &str) -> Result<PathBuf, ChainError> {
    if !dir.is_dir() {
        return Err(ChainError::no_data(
            ticker,
            format!("data directory {} not found", dir.display()),
        ));
    }

    let needle = ticker.to_lowercase();
    let preferred = dir.join(format!("{needle}_quotedata.csv"));
    if preferred.is_file() {
        return Ok(preferred);
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| ChainError::no_data(ticker, format!("listing {}: {e}", dir.display())))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| names_ticker(path, &needle))
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        ChainError::no_data(ticker, format!("no CSV export in {}", dir.display()))
    })
}

/// A `.csv` file whose stem, split on `_`, `-`, `.` and spaces, has a token
/// equal to the ticker. Dotted tickers (`brk.b`) keep their dot.
fn names_ticker(path: &Path, needle: &str) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let Some(stem) = name.strip_suffix(".csv") else {
        return false;
    };
    if needle.contains('.') {
        stem.split(['_', '-', ' ']).any(|token| token == needle)
    } else {
        stem.split(['_', '-', '.', ' ']).any(|token| token == needle)
    }
}
