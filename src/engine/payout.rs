use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{CONTRACT_MULTIPLIER, StrikeRow};

/// Aggregate holder payout if the underlying settles at `strike`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutPoint {
    pub strike: Decimal,
    pub call_payout: Decimal,
    pub put_payout: Decimal,
    pub total: Decimal,
}

/// Payout at settlement price `x` across the whole ladder.
///
/// Calls pay `max(0, x - k)` and puts pay `max(0, k - x)` per share, times open
/// interest times the contract multiplier. `None` if the sum leaves `Decimal` range.
pub fn payout_at(x: Decimal, rows: &[StrikeRow]) -> Option<PayoutPoint> {
    let multiplier = Decimal::from(CONTRACT_MULTIPLIER);
    let mut call_payout = Decimal::ZERO;
    let mut put_payout = Decimal::ZERO;

    for row in rows {
        if x > row.strike {
            let leg = leg_payout(x.checked_sub(row.strike)?, row.call_open_interest, multiplier)?;
            call_payout = call_payout.checked_add(leg)?;
        } else if x < row.strike {
            let leg = leg_payout(row.strike.checked_sub(x)?, row.put_open_interest, multiplier)?;
            put_payout = put_payout.checked_add(leg)?;
        }
    }

    Some(PayoutPoint {
        strike: x,
        call_payout,
        put_payout,
        total: call_payout.checked_add(put_payout)?,
    })
}

fn leg_payout(intrinsic: Decimal, open_interest: u64, multiplier: Decimal) -> Option<Decimal> {
    intrinsic
        .checked_mul(Decimal::from(open_interest))?
        .checked_mul(multiplier)
}
