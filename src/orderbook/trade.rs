//! The trade record produced by one maker/taker pairing (spec.md §3
//! "Trade").

use crate::types::{Amount, OrderId, Side, TradeId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `{id, symbol, maker_order_id, taker_order_id, price, qty, maker_side, ts}`.
/// Invariant: `price` equals the maker's resting `limit_price` at the time
/// of execution (price-time priority: the maker sets the price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub price: Amount,
    pub qty: Amount,
    pub maker_side: Side,
    pub ts: u64,
    /// Fee charged (positive) or rebated (negative) to the maker, zero if
    /// no `FeeSchedule` is configured.
    pub maker_fee: Amount,
    /// Fee charged to the taker, zero if no `FeeSchedule` is configured.
    pub taker_fee: Amount,
}

/// Callback invoked synchronously for every trade produced by a book's
/// matching loop. A shared, type-erased closure rather than an open trait,
/// since the only consumers are same-process subscribers (engine,
/// market-data feed).
pub type TradeListener = Arc<dyn Fn(&Trade) + Send + Sync>;

/// The full result of one `match()` invocation: every trade produced plus
/// bookkeeping the engine needs to emit `PartiallyFilled`/`Filled` events
/// and update reservations.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    /// Maker order ids that reached zero remaining quantity and were
    /// removed from the book during this match.
    pub filled_makers: Vec<OrderId>,
    /// Maker order ids cancelled by self-trade prevention during this
    /// match (not filled, just removed).
    pub stp_cancelled_makers: Vec<OrderId>,
    /// Quantity of the taker still unfilled after the aggression loop
    /// halted (no more marketable depth, or protection band hit).
    pub taker_remaining: Amount,
}
