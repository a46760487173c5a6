use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::occ::OccSymbol;
use super::{ExpirationMatch, OptionSource, QuoteChain, QuoteContract, RawChain, select_expiration};
use crate::error::ChainError;

const CBOE_QUOTES_URL: &str = "https://cdn.cboe.com/api/global/delayed_quotes/options";

// ── API response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    data: QuotesData,
}

#[derive(Debug, Deserialize)]
struct QuotesData {
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    options: Vec<OptionQuote>,
}

#[derive(Debug, Deserialize)]
struct OptionQuote {
    option: String,
    #[serde(default)]
    open_interest: Option<f64>,
}

// ── Source ───────────────────────────────────────────────────────────

/// CBOE delayed quotes: one request returns every listed contract for a ticker.
pub struct CboeSource {
    client: reqwest::Client,
    base_url: String,
    expiration_match: ExpirationMatch,
}

impl CboeSource {
    pub fn new(client: reqwest::Client, expiration_match: ExpirationMatch) -> Self {
        Self::with_base_url(client, CBOE_QUOTES_URL, expiration_match)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: &str,
        expiration_match: ExpirationMatch,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            expiration_match,
        }
    }

    async fn download(&self, ticker: &str) -> Result<String, ChainError> {
        let url = format!("{}/{}.json", self.base_url, ticker.to_uppercase());
        debug!(%url, "requesting option chain");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::unavailable(ticker, e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(ChainError::no_data(ticker, format!("HTTP {status}")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            return Err(ChainError::unavailable(ticker, format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ChainError::no_data(ticker, format!("HTTP {status}")));
        }

        resp.text()
            .await
            .map_err(|e| ChainError::unavailable(ticker, format!("reading body: {e}")))
    }
}

#[async_trait]
impl OptionSource for CboeSource {
    fn name(&self) -> &'static str {
        "cboe"
    }

    async fn fetch(&self, ticker: &str, _expiration: NaiveDate) -> Result<RawChain, ChainError> {
        let body = self.download(ticker).await?;
        Ok(RawChain::QuotesJson {
            body,
            expiration_match: self.expiration_match,
        })
    }

    fn supports_batch_caching(&self) -> bool {
        true
    }
}

/// Decode a quotes body and keep only contracts for the selected expiration.
pub fn parse_quotes(
    ticker: &str,
    body: &str,
    expiration: NaiveDate,
    mode: ExpirationMatch,
) -> Result<QuoteChain, ChainError> {
    let resp: QuotesResponse = serde_json::from_str(body)
        .map_err(|e| ChainError::malformed(ticker, format!("decoding quotes: {e}")))?;

    if resp.data.options.is_empty() {
        return Err(ChainError::no_data(ticker, "no listed options"));
    }

    let listed: BTreeSet<NaiveDate> = resp
        .data
        .options
        .iter()
        .filter_map(|q| OccSymbol::parse(&q.option))
        .map(|occ| occ.expiration)
        .collect();
    let listed: Vec<NaiveDate> = listed.into_iter().collect();

    let selected = select_expiration(&listed, expiration, mode).ok_or_else(|| {
        let shown: Vec<String> = listed.iter().map(|d| d.to_string()).collect();
        ChainError::no_data(
            ticker,
            format!("expiration {expiration} not listed (available: {})", shown.join(", ")),
        )
    })?;
    if selected != expiration {
        debug!(%ticker, requested = %expiration, %selected, "using closest listed expiration");
    }

    let contracts = resp
        .data
        .options
        .into_iter()
        .filter(|q| OccSymbol::parse(&q.option).is_some_and(|occ| occ.expiration == selected))
        .map(|q| QuoteContract {
            symbol: q.option,
            open_interest: q.open_interest,
        })
        .collect();

    Ok(QuoteChain {
        ticker: ticker.to_uppercase(),
        current_price: resp.data.current_price,
        expiration: selected,
        contracts,
    })
}
