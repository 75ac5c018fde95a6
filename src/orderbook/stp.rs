//! Self-trade prevention (spec.md §4.1 point 3, §9 Open Questions).
//!
//! The only policy spec.md wires into the matching loop is `CancelMaker`;
//! `CancelTaker`/`CancelBoth` are kept on [`STPMode`] as the documented
//! future-extension points spec.md §9 reserves, but the engine never
//! selects them by default.

use crate::types::{Hash32, OrderId};
use serde::{Deserialize, Serialize};

/// Self-trade prevention mode for an order book.
///
/// Orders carrying `user_id == Hash32::zero()` (anonymous) always bypass
/// STP checks, regardless of the configured mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum STPMode {
    /// No self-trade prevention. Zero overhead in the matching hot path.
    #[default]
    None = 0,
    /// Cancel the incoming (taker) order when a self-trade would occur.
    /// Reserved extension point; not wired into the default engine config.
    CancelTaker = 1,
    /// Cancel the resting (maker) order(s) from the same user and continue
    /// matching the taker against the remainder. The only policy spec.md
    /// authorizes.
    CancelMaker = 2,
    /// Cancel both the incoming and resting order. Reserved extension
    /// point; not wired into the default engine config.
    CancelBoth = 3,
}

impl std::fmt::Display for STPMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            STPMode::None => "none",
            STPMode::CancelTaker => "cancel_taker",
            STPMode::CancelMaker => "cancel_maker",
            STPMode::CancelBoth => "cancel_both",
        };
        write!(f, "{s}")
    }
}

impl STPMode {
    /// `true` for any mode other than `None`.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != STPMode::None
    }
}

/// Outcome of an STP check against a single price level, used internally
/// by the matching loop.
#[derive(Debug, Clone)]
pub(crate) enum STPAction {
    /// No self-trade detected at this level; proceed normally.
    NoConflict,
    /// Reserved for `CancelTaker`: match up to `safe_quantity`, then stop.
    #[allow(dead_code)]
    CancelTaker { safe_quantity: crate::types::Amount },
    /// `CancelMaker` triggered: these resting orders belong to the taker's
    /// user and must be cancelled before matching proceeds at this level.
    CancelMaker { maker_order_ids: Vec<OrderId> },
    /// Reserved for `CancelBoth`: match up to `safe_quantity`, then cancel
    /// the maker and stop.
    #[allow(dead_code)]
    CancelBoth {
        safe_quantity: crate::types::Amount,
        maker_order_id: OrderId,
    },
}

/// Detect same-user resting orders at a price level ahead of matching.
/// Only `STPMode::CancelMaker` is exercised by the engine today; the other
/// branches are reserved for future wiring.
pub(crate) fn check_stp_at_level(
    mode: STPMode,
    taker_user_id: Hash32,
    level_orders: &[(OrderId, Hash32)],
) -> STPAction {
    if !mode.is_enabled() || taker_user_id.is_zero() {
        return STPAction::NoConflict;
    }
    match mode {
        STPMode::CancelMaker => {
            let conflicting: Vec<OrderId> = level_orders
                .iter()
                .filter(|(_, uid)| *uid == taker_user_id)
                .map(|(id, _)| *id)
                .collect();
            if conflicting.is_empty() {
                STPAction::NoConflict
            } else {
                STPAction::CancelMaker {
                    maker_order_ids: conflicting,
                }
            }
        }
        STPMode::None | STPMode::CancelTaker | STPMode::CancelBoth => STPAction::NoConflict,
    }
}
