use thiserror::Error;

/// Failure kinds for one ticker's trip through the pipeline.
///
/// Only `InvalidExpirationSpec` is batch-fatal. Everything else is caught at the
/// orchestrator / engine boundary and turned into a recorded failure, with the
/// `Display` text used as the failure's `error_detail`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("invalid expiration spec `{spec}`: expected YYYY-MM-DD, current_month_third_friday, next_month_third_friday or next_monthly")]
    InvalidExpirationSpec { spec: String },

    #[error("source unavailable for {ticker}: {detail}")]
    SourceUnavailable { ticker: String, detail: String },

    #[error("no option data for {ticker}: {detail}")]
    NoDataForTicker { ticker: String, detail: String },

    #[error("malformed option chain for {ticker}: {detail}")]
    MalformedChain { ticker: String, detail: String },

    #[error("degenerate option chain for {ticker}: every strike has zero open interest")]
    DegenerateChain { ticker: String },
}

impl ChainError {
    pub fn unavailable(ticker: &str, detail: impl Into<String>) -> Self {
        ChainError::SourceUnavailable {
            ticker: ticker.to_string(),
            detail: detail.into(),
        }
    }

    pub fn no_data(ticker: &str, detail: impl Into<String>) -> Self {
        ChainError::NoDataForTicker {
            ticker: ticker.to_string(),
            detail: detail.into(),
        }
    }

    pub fn malformed(ticker: &str, detail: impl Into<String>) -> Self {
        ChainError::MalformedChain {
            ticker: ticker.to_string(),
            detail: detail.into(),
        }
    }

    /// Network/timeout class failures. Retrying anything else cannot produce data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::SourceUnavailable { .. })
    }

    /// Short machine-friendly label, used in logs and the JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::InvalidExpirationSpec { .. } => "invalid_expiration_spec",
            ChainError::SourceUnavailable { .. } => "source_unavailable",
            ChainError::NoDataForTicker { .. } => "no_data_for_ticker",
            ChainError::MalformedChain { .. } => "malformed_chain",
            ChainError::DegenerateChain { .. } => "degenerate_chain",
        }
    }
}
