use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Open interest at one strike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeRow {
    pub strike: Decimal,
    #[serde(default)]
    pub call_open_interest: u64,
    #[serde(default)]
    pub put_open_interest: u64,
}

impl StrikeRow {
    pub fn new(strike: Decimal, call_open_interest: u64, put_open_interest: u64) -> Self {
        Self {
            strike,
            call_open_interest,
            put_open_interest,
        }
    }

    pub fn total_open_interest(&self) -> u128 {
        u128::from(self.call_open_interest) + u128::from(self.put_open_interest)
    }
}

/// One ticker's normalized option chain for one expiration, as of one date.
///
/// `strikes` is sorted ascending with unique strike prices; the normalizer is
/// the only producer and upholds that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub current_price: Decimal,
    pub strikes: Vec<StrikeRow>,
}

impl OptionChainSnapshot {
    /// `None` if the total does not fit in a `u64`.
    pub fn total_call_oi(&self) -> Option<u64> {
        self.strikes
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.call_open_interest))
    }

    pub fn total_put_oi(&self) -> Option<u64> {
        self.strikes
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.put_open_interest))
    }

    /// True when no strike carries any open interest; max pain is undefined then.
    pub fn is_degenerate(&self) -> bool {
        self.strikes.iter().all(|r| r.total_open_interest() == 0)
    }

    pub fn strike_range(&self) -> Option<(Decimal, Decimal)> {
        Some((self.strikes.first()?.strike, self.strikes.last()?.strike))
    }
}
