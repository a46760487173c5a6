use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Directional signal from the sign of net premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PremiumBias {
    Call,
    Put,
    Neutral,
}

impl PremiumBias {
    pub fn from_net_premium(net_premium: Decimal) -> Self {
        if net_premium > Decimal::ZERO {
            PremiumBias::Call
        } else if net_premium < Decimal::ZERO {
            PremiumBias::Put
        } else {
            PremiumBias::Neutral
        }
    }
}

impl fmt::Display for PremiumBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PremiumBias::Call => write!(f, "CALL"),
            PremiumBias::Put => write!(f, "PUT"),
            PremiumBias::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Max-pain computation for one ticker. Built once by the engine, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxPainResult {
    pub ticker: String,
    pub expiration_date: NaiveDate,
    pub current_price: Decimal,
    pub max_pain_price: Decimal,
    pub min_total_payout: Decimal,
    pub pct_change: Decimal,
    /// Open-interest notional (ITM call OI minus ITM put OI, ×100) at the max-pain
    /// strike. Not a traded-premium dollar value.
    pub net_premium: Decimal,
    pub premium_bias: PremiumBias,
    pub total_call_oi: u64,
    pub total_put_oi: u64,
}
