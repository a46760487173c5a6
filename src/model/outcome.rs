use serde::{Deserialize, Serialize};

use crate::error::ChainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionStatus {
    FetchedNew,
    FetchedCached,
    Failed,
}

/// Per-ticker bookkeeping from the acquisition phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionOutcome {
    pub ticker: String,
    pub status: AcquisitionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl AcquisitionOutcome {
    pub fn fetched(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            status: AcquisitionStatus::FetchedNew,
            error_detail: None,
        }
    }

    pub fn cached(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            status: AcquisitionStatus::FetchedCached,
            error_detail: None,
        }
    }

    pub fn failed(ticker: &str, detail: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            status: AcquisitionStatus::Failed,
            error_detail: Some(detail.into()),
        }
    }

    pub fn from_error(ticker: &str, err: &ChainError) -> Self {
        Self::failed(ticker, err.to_string())
    }

    pub fn is_failed(&self) -> bool {
        self.status == AcquisitionStatus::Failed
    }
}
