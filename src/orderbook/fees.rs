//! Fee schedule for trade settlement (SPEC_FULL.md §3: ambient enrichment
//! of the zero-fee four-legged swap spec.md §4.2 describes).

use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// Configurable fee schedule for maker and taker fees.
///
/// Fees are expressed in basis points (bps), where 1 bps = 0.01%. Negative
/// values represent rebates (common for maker fees, to reward liquidity
/// provision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Maker fee in basis points; negative values are rebates.
    pub maker_fee_bps: i32,
    /// Taker fee in basis points; always non-negative.
    pub taker_fee_bps: i32,
}

impl FeeSchedule {
    #[must_use = "FeeSchedule does nothing unless used"]
    pub fn new(maker_fee_bps: i32, taker_fee_bps: i32) -> Self {
        Self {
            maker_fee_bps,
            taker_fee_bps,
        }
    }

    /// A schedule that charges nothing on either side.
    #[must_use]
    pub fn zero_fee() -> Self {
        Self::new(0, 0)
    }

    /// A schedule that pays the maker a rebate while charging the taker.
    #[must_use]
    pub fn with_maker_rebate(rebate_bps: i32, taker_fee_bps: i32) -> Self {
        Self::new(-rebate_bps, taker_fee_bps)
    }

    /// `true` if both legs are zero.
    #[must_use]
    pub fn is_zero_fee(self) -> bool {
        self.maker_fee_bps == 0 && self.taker_fee_bps == 0
    }

    /// Fee owed on `notional` for one side of a trade. Positive values are
    /// charges, negative values are rebates.
    #[must_use]
    pub fn calculate_fee(self, notional: Amount, is_maker: bool) -> Amount {
        let bps = if is_maker {
            self.maker_fee_bps
        } else {
            self.taker_fee_bps
        };
        let bps_amount = Amount::from_raw(bps as i128 * (Amount::from_integer(1).raw() / 10_000));
        notional
            .checked_mul_qty(bps_amount)
            .expect("fee calculation must not overflow")
    }
}
