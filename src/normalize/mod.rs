//! Source-native chains → [`OptionChainSnapshot`].
//!
//! Absent open interest counts as zero. Negative or unparsable values reject
//! the whole chain rather than being clamped, and repeated strikes are merged by
//! summing their open interest.

mod csv_export;

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::error::ChainError;
use crate::fetch_data::source::occ::{OccSymbol, OptionKind};
use crate::fetch_data::source::cboe::parse_quotes;
use crate::fetch_data::source::{QuoteChain, RawChain};
use crate::model::{OptionChainSnapshot, StrikeRow};

/// Strike → (call OI, put OI), merged across duplicate rows.
#[derive(Debug, Default)]
struct Ladder {
    rows: BTreeMap<Decimal, (u64, u64)>,
}

impl Ladder {
    fn add(&mut self, strike: Decimal, call_oi: u64, put_oi: u64) -> Result<(), String> {
        let entry = self.rows.entry(strike.normalize()).or_default();
        match (entry.0.checked_add(call_oi), entry.1.checked_add(put_oi)) {
            (Some(calls), Some(puts)) => {
                *entry = (calls, puts);
                Ok(())
            }
            _ => Err(format!("open interest overflow at strike {strike}")),
        }
    }

    fn into_rows(self) -> Vec<StrikeRow> {
        self.rows
            .into_iter()
            .map(|(strike, (call, put))| StrikeRow::new(strike, call, put))
            .collect()
    }
}

/// Map a raw chain onto the canonical snapshot.
pub fn normalize(
    raw: &RawChain,
    ticker: &str,
    as_of_date: NaiveDate,
    expiration_date: NaiveDate,
) -> Result<OptionChainSnapshot, ChainError> {
    let (current_price, expiration_date, ladder) = match raw {
        RawChain::Quotes(chain) => {
            let (price, ladder) = from_quotes(chain, ticker)?;
            (price, chain.expiration, ladder)
        }
        RawChain::QuotesJson {
            body,
            expiration_match,
        } => {
            let chain = parse_quotes(ticker, body, expiration_date, *expiration_match)?;
            let (price, ladder) = from_quotes(&chain, ticker)?;
            (price, chain.expiration, ladder)
        }
        RawChain::CsvExport { text, .. } => {
            let (price, ladder) = csv_export::parse(text, ticker, expiration_date)?;
            (price, expiration_date, ladder)
        }
    };

    if current_price <= Decimal::ZERO {
        return Err(ChainError::malformed(
            ticker,
            format!("current price {current_price} is not positive"),
        ));
    }

    let strikes = ladder.into_rows();
    if strikes.is_empty() {
        return Err(ChainError::malformed(ticker, "no strikes"));
    }
    debug!(%ticker, strikes = strikes.len(), %current_price, %expiration_date, "normalized chain");

    let snapshot = OptionChainSnapshot {
        ticker: ticker.to_uppercase(),
        as_of_date,
        expiration_date,
        current_price,
        strikes,
    };
    if snapshot.total_call_oi().is_none() || snapshot.total_put_oi().is_none() {
        return Err(ChainError::malformed(ticker, "open interest total overflow"));
    }
    Ok(snapshot)
}

fn from_quotes(chain: &QuoteChain, ticker: &str) -> Result<(Decimal, Ladder), ChainError> {
    let price = chain
        .current_price
        .and_then(decimal_from_f64)
        .ok_or_else(|| ChainError::malformed(ticker, "missing current price"))?;

    let mut ladder = Ladder::default();
    for contract in &chain.contracts {
        let occ = OccSymbol::parse(&contract.symbol).ok_or_else(|| {
            ChainError::malformed(ticker, format!("unparsable option symbol `{}`", contract.symbol))
        })?;
        if occ.expiration != chain.expiration {
            continue;
        }
        if occ.strike <= Decimal::ZERO {
            return Err(ChainError::malformed(
                ticker,
                format!("non-positive strike in `{}`", contract.symbol),
            ));
        }
        let oi = match contract.open_interest {
            None => 0,
            Some(v) => open_interest_from_f64(v)
                .map_err(|e| ChainError::malformed(ticker, format!("{}: {e}", contract.symbol)))?,
        };
        let added = match occ.kind {
            OptionKind::Call => ladder.add(occ.strike, oi, 0),
            OptionKind::Put => ladder.add(occ.strike, 0, oi),
        };
        added.map_err(|e| ChainError::malformed(ticker, e))?;
    }
    Ok((price, ladder))
}

/// Parse one open-interest cell. Blank is zero.
fn parse_open_interest(cell: &str) -> Result<u64, String> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(0);
    }
    let value = Decimal::from_str(&cleaned)
        .map_err(|_| format!("unparsable open interest `{}`", cell.trim()))?;
    whole_contracts(value)
}

fn open_interest_from_f64(v: f64) -> Result<u64, String> {
    let value = decimal_from_f64(v).ok_or_else(|| format!("open interest {v} is not finite"))?;
    whole_contracts(value)
}

fn whole_contracts(value: Decimal) -> Result<u64, String> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(format!("negative open interest {value}"));
    }
    if !value.fract().is_zero() {
        return Err(format!("fractional open interest {value}"));
    }
    value
        .to_u64()
        .ok_or_else(|| format!("open interest {value} out of range"))
}

/// Shortest decimal rendering of an f64, so 185.1 stays 185.1.
fn decimal_from_f64(v: f64) -> Option<Decimal> {
    if !v.is_finite() {
        return None;
    }
    Decimal::from_str(&v.to_string()).ok()
}
