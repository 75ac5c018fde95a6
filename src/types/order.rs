//! The `Order` record and its closed sum type over order kinds
//! (spec.md §3 "Order", §9 "closed sum type over the eight order types").

use super::amount::{Amount, SCALE};
use super::ids::{Hash32, OrderId};
use super::side::Side;
use super::tif::TimeInForce;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an order (spec.md §3, §4.4 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    New,
    PendingTrigger,
    Active,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderState {
    /// `true` for any state an order cannot leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected | OrderState::Expired
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderState::New => "new",
            OrderState::PendingTrigger => "pending_trigger",
            OrderState::Active => "active",
            OrderState::PartiallyFilled => "partially_filled",
            OrderState::Filled => "filled",
            OrderState::Cancelled => "cancelled",
            OrderState::Rejected => "rejected",
            OrderState::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Which side of a take-profit or stop executes as once triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerExecStyle {
    Market,
    Limit,
}

/// The trailing distance carried by a `TrailingStop`: a fixed absolute
/// amount, or a percentage (in basis points) of the running high-water mark
/// (spec.md §3, §6: a trailing stop carries either `trail_amount` or
/// `trail_percent`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrailOffset {
    Amount(Amount),
    PercentBps(u32),
}

impl TrailOffset {
    /// The absolute distance this offset represents off `reference` (the
    /// current high-water mark). A percent offset is recomputed against the
    /// new high-water mark every time it moves, so the trigger price tracks
    /// a constant percentage rather than a constant amount.
    #[must_use]
    pub fn delta(&self, reference: Amount) -> Amount {
        match self {
            TrailOffset::Amount(a) => *a,
            TrailOffset::PercentBps(bps) => {
                let factor = Amount::from_raw(i128::from(*bps) * (SCALE / 10_000));
                reference.checked_mul_qty(factor).unwrap_or(Amount::ZERO)
            }
        }
    }
}

/// The type-specific parameters of an order; the shared lifecycle fields
/// (id, user, symbol, side, quantities, state, timestamps, reservations)
/// live on the enclosing [`Order`]. This is the closed sum type spec.md §9
/// calls for: eight variants, pattern-matched by the engine and trigger
/// registry, no open-ended plugin interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Rests on the book at `limit_price` until filled, cancelled, or
    /// expired. `post_only` rejects rather than crossing on entry.
    Limit { limit_price: Amount, post_only: bool },
    /// Never rests; walks the book until exhausted, `protection_band`
    /// violated, or fully filled.
    Market,
    /// Fires as a market order once the trigger condition is met.
    Stop { stop_price: Amount },
    /// Fires as a limit order at `limit_price` once the trigger condition
    /// is met.
    StopLimit {
        stop_price: Amount,
        limit_price: Amount,
    },
    /// Trigger price follows the best favourable extreme by `trail`
    /// (fixed amount or percent), firing as a market order.
    /// `high_water_mark` tracks the running extreme (high for longs
    /// protecting a sell, low for shorts protecting a buy).
    TrailingStop {
        trail: TrailOffset,
        high_water_mark: Amount,
    },
    /// Fires as `exec` (market or limit) once `trigger_price` is reached.
    TakeProfit {
        trigger_price: Amount,
        limit_price: Option<Amount>,
        exec: TriggerExecStyle,
    },
    /// Only `display_qty` is visible on the book at a time; the remainder
    /// is reserved but hidden. Re-issued slices get a fresh `accepted_ts`.
    Iceberg {
        limit_price: Amount,
        display_qty: Amount,
    },
    /// One leg of a one-cancels-other pair. `sibling_id` is cancelled the
    /// moment this leg fills or triggers.
    OcoLeg {
        sibling_id: OrderId,
        inner: Box<OrderKind>,
    },
}

impl OrderKind {
    /// `true` for kinds that start in `PendingTrigger` rather than `New`
    /// going straight to `Active`/matching.
    #[must_use]
    pub fn starts_pending_trigger(&self) -> bool {
        match self {
            OrderKind::Stop { .. }
            | OrderKind::StopLimit { .. }
            | OrderKind::TrailingStop { .. }
            | OrderKind::TakeProfit { .. } => true,
            OrderKind::OcoLeg { inner, .. } => inner.starts_pending_trigger(),
            OrderKind::Limit { .. } | OrderKind::Market | OrderKind::Iceberg { .. } => false,
        }
    }

    /// Unwraps an `OcoLeg` down to the inner kind it dispatches as; returns
    /// `self` for every other variant.
    #[must_use]
    pub fn dispatch_kind(&self) -> &OrderKind {
        match self {
            OrderKind::OcoLeg { inner, .. } => inner.dispatch_kind(),
            other => other,
        }
    }

    /// Mutable counterpart of [`Self::dispatch_kind`], used by the trigger
    /// registry to update a trailing stop's water mark in place even when
    /// it is wrapped in an `OcoLeg`.
    pub fn dispatch_kind_mut(&mut self) -> &mut OrderKind {
        match self {
            OrderKind::OcoLeg { inner, .. } => inner.dispatch_kind_mut(),
            other => other,
        }
    }

    /// The resting/limit price this kind matches at once active, if any.
    #[must_use]
    pub fn limit_price(&self) -> Option<Amount> {
        match self {
            OrderKind::Limit { limit_price, .. } => Some(*limit_price),
            OrderKind::StopLimit { limit_price, .. } => Some(*limit_price),
            OrderKind::TakeProfit { limit_price, .. } => *limit_price,
            OrderKind::Iceberg { limit_price, .. } => Some(*limit_price),
            OrderKind::OcoLeg { inner, .. } => inner.limit_price(),
            OrderKind::Market | OrderKind::Stop { .. } | OrderKind::TrailingStop { .. } => None,
        }
    }

    /// `true` if `post_only` was requested (only meaningful for `Limit`).
    #[must_use]
    pub fn is_post_only(&self) -> bool {
        matches!(self, OrderKind::Limit { post_only: true, .. })
    }
}

/// The central order record (spec.md §3). Shared lifecycle fields live
/// here; type-specific parameters live in [`OrderKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Hash32,
    pub symbol_key: String,
    pub side: Side,
    pub kind: OrderKind,
    pub qty: Amount,
    pub filled_qty: Amount,
    pub tif: TimeInForce,
    pub state: OrderState,
    /// Monotonic nanoseconds assigned at engine entry; the sole time
    /// priority key. Re-issued iceberg slices get a fresh value.
    pub accepted_ts: u64,
    pub reserved_base: Amount,
    pub reserved_quote: Amount,
    /// Present for an OCO leg's sibling even after the pair is split out
    /// into two independent `OrderKind::OcoLeg` orders, for fast lookup.
    pub oco_sibling_id: Option<OrderId>,
}

impl Order {
    /// `qty - filled_qty`. Invariant: `0 <= filled_qty <= qty`.
    #[must_use]
    pub fn remaining_qty(&self) -> Amount {
        self.qty
            .checked_sub(self.filled_qty)
            .expect("filled_qty must never exceed qty")
    }

    /// `true` once `remaining_qty` reaches zero.
    #[must_use]
    pub fn is_fully_filled(&self) -> bool {
        self.remaining_qty().is_zero()
    }

    /// Record a fill of `qty` against this order, advancing `filled_qty`
    /// and transitioning `state` from `Active` to `PartiallyFilled` or
    /// `Filled` as appropriate. Never moves a terminal order.
    pub fn apply_fill(&mut self, qty: Amount) {
        debug_assert!(!self.state.is_terminal());
        self.filled_qty = self
            .filled_qty
            .checked_add(qty)
            .expect("fill must not overflow filled_qty");
        self.state = if self.is_fully_filled() {
            OrderState::Filled
        } else {
            OrderState::PartiallyFilled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_offset_ignores_reference() {
        let off = TrailOffset::Amount(Amount::from_decimal_str("5.00").unwrap());
        assert_eq!(off.delta(Amount::from_decimal_str("1000.00").unwrap()), Amount::from_decimal_str("5.00").unwrap());
        assert_eq!(off.delta(Amount::from_decimal_str("1.00").unwrap()), Amount::from_decimal_str("5.00").unwrap());
    }

    #[test]
    fn percent_offset_scales_with_reference() {
        let off = TrailOffset::PercentBps(500); // 5%
        assert_eq!(
            off.delta(Amount::from_decimal_str("100.00").unwrap()),
            Amount::from_decimal_str("5.00").unwrap()
        );
        assert_eq!(
            off.delta(Amount::from_decimal_str("200.00").unwrap()),
            Amount::from_decimal_str("10.00").unwrap()
        );
    }
}
