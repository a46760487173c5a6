//! Max-pain search.
//!
//! Total payout is piecewise linear in the settlement price with breakpoints
//! only at listed strikes, so evaluating every listed strike finds the exact
//! minimum. Cost is O(S²) in the number of strikes.

mod payout;

pub use payout::{PayoutPoint, payout_at};

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ChainError;
use crate::model::{CONTRACT_MULTIPLIER, MaxPainResult, OptionChainSnapshot, PremiumBias};

/// Payout at every listed strike, ascending by strike.
pub fn payout_curve(snapshot: &OptionChainSnapshot) -> Result<Vec<PayoutPoint>, ChainError> {
    snapshot
        .strikes
        .iter()
        .map(|row| payout_at(row.strike, &snapshot.strikes).ok_or_else(|| overflow(snapshot, "payout")))
        .collect()
}

/// Compute the max-pain strike and the derived metrics for one snapshot.
///
/// Ties on total payout resolve to the lowest strike. Arithmetic that leaves
/// numeric range is reported as a malformed chain for this ticker only.
pub fn compute(snapshot: &OptionChainSnapshot) -> Result<MaxPainResult, ChainError> {
    if snapshot.strikes.is_empty() || snapshot.is_degenerate() {
        return Err(ChainError::DegenerateChain {
            ticker: snapshot.ticker.clone(),
        });
    }
    if snapshot.current_price <= Decimal::ZERO {
        return Err(ChainError::malformed(
            &snapshot.ticker,
            format!("current price {} is not positive", snapshot.current_price),
        ));
    }
    let total_call_oi = snapshot
        .total_call_oi()
        .ok_or_else(|| overflow(snapshot, "call open interest total"))?;
    let total_put_oi = snapshot
        .total_put_oi()
        .ok_or_else(|| overflow(snapshot, "put open interest total"))?;

    let curve = payout_curve(snapshot)?;

    // Strict `<` keeps the first (lowest) strike on ties; the curve is ascending.
    let mut best = &curve[0];
    for point in &curve[1..] {
        if point.total < best.total {
            best = point;
        }
    }

    let max_pain_price = best.strike;
    let pct_change = max_pain_price
        .checked_sub(snapshot.current_price)
        .and_then(|diff| diff.checked_div(snapshot.current_price))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| overflow(snapshot, "percentage change"))?;
    let net_premium =
        net_premium(snapshot, max_pain_price).ok_or_else(|| overflow(snapshot, "net premium"))?;

    debug!(
        ticker = %snapshot.ticker,
        strikes = curve.len(),
        %max_pain_price,
        min_total_payout = %best.total,
        %net_premium,
        "max pain computed"
    );

    Ok(MaxPainResult {
        ticker: snapshot.ticker.clone(),
        expiration_date: snapshot.expiration_date,
        current_price: snapshot.current_price,
        max_pain_price,
        min_total_payout: best.total,
        pct_change,
        net_premium,
        premium_bias: PremiumBias::from_net_premium(net_premium),
        total_call_oi,
        total_put_oi,
    })
}

/// ITM call OI below `pivot` minus ITM put OI above it, times the multiplier.
///
/// An open-interest notional, not a dollar premium: the chain carries no trade prices.
/// `None` if the sums leave `Decimal` range.
pub fn net_premium(snapshot: &OptionChainSnapshot, pivot: Decimal) -> Option<Decimal> {
    let mut calls = Decimal::ZERO;
    let mut puts = Decimal::ZERO;
    for row in &snapshot.strikes {
        if row.strike < pivot {
            calls = calls.checked_add(Decimal::from(row.call_open_interest))?;
        } else if row.strike > pivot {
            puts = puts.checked_add(Decimal::from(row.put_open_interest))?;
        }
    }
    let multiplier = Decimal::from(CONTRACT_MULTIPLIER);
    calls
        .checked_mul(multiplier)?
        .checked_sub(puts.checked_mul(multiplier)?)
}

fn overflow(snapshot: &OptionChainSnapshot, what: &str) -> ChainError {
    ChainError::malformed(&snapshot.ticker, format!("{what} out of range"))
}
