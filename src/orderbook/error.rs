//! Order book error types: the "client errors" of spec.md §7 — local,
//! surfaced to the gateway as `Rejected`/`Cancelled` events, engine state
//! left untouched.

use crate::types::{Amount, Hash32, OrderId, Side};
use std::fmt;

/// Errors that can occur within the [`crate::orderbook::OrderBook`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// Order not found in the book.
    OrderNotFound(OrderId),

    /// An operation targeted an order that is already in a terminal state.
    AlreadyTerminal(OrderId),

    /// Price is not a multiple of the configured tick size.
    TickSizeViolation { price: Amount, tick_size: Amount },

    /// Quantity is not a multiple of the configured lot size.
    LotSizeViolation { quantity: Amount, lot_size: Amount },

    /// `price * quantity` is below the configured minimum notional.
    MinNotionalViolation { notional: Amount, min_notional: Amount },

    /// Quantity exceeds the configured maximum order quantity.
    OrderSizeOutOfRange { quantity: Amount, max: Amount },

    /// A post-only order would have crossed the book on entry.
    PostOnlyCrossed {
        side: Side,
        price: Amount,
        opposite_price: Amount,
    },

    /// A fill-or-kill order could not be filled completely in one pass.
    FokUnfillable,

    /// Market order exhausted available depth without a protection-band
    /// violation, but opposing liquidity ran out before full fill.
    InsufficientLiquidity { side: Side, requested: Amount, available: Amount },

    /// A market order would walk further than `protection_band_bps` from
    /// the best opposite price; the remainder is rejected rather than
    /// filled at an unbounded price.
    ProtectionBandExceeded { side: Side, limit_price: Amount },

    /// Self-trade prevention triggered: the incoming order would have
    /// matched against a resting order from the same user.
    SelfTradePrevented { taker_order_id: OrderId, user_id: Hash32 },
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::OrderNotFound(id) => write!(f, "order not found: {id}"),
            OrderBookError::AlreadyTerminal(id) => {
                write!(f, "order {id} is already in a terminal state")
            }
            OrderBookError::TickSizeViolation { price, tick_size } => write!(
                f,
                "invalid tick size: price {price} is not a multiple of tick size {tick_size}"
            ),
            OrderBookError::LotSizeViolation { quantity, lot_size } => write!(
                f,
                "invalid lot size: quantity {quantity} is not a multiple of lot size {lot_size}"
            ),
            OrderBookError::MinNotionalViolation {
                notional,
                min_notional,
            } => write!(
                f,
                "notional {notional} is below the minimum notional {min_notional}"
            ),
            OrderBookError::OrderSizeOutOfRange { quantity, max } => {
                write!(f, "order quantity {quantity} exceeds maximum {max}")
            }
            OrderBookError::PostOnlyCrossed {
                side,
                price,
                opposite_price,
            } => write!(
                f,
                "post-only {side} at {price} would cross the book at {opposite_price}"
            ),
            OrderBookError::FokUnfillable => {
                write!(f, "fill-or-kill order could not be fully filled")
            }
            OrderBookError::InsufficientLiquidity {
                side,
                requested,
                available,
            } => write!(
                f,
                "insufficient liquidity for {side} order: requested {requested}, available {available}"
            ),
            OrderBookError::ProtectionBandExceeded { side, limit_price } => write!(
                f,
                "{side} market order exceeded its protection band at {limit_price}"
            ),
            OrderBookError::SelfTradePrevented {
                taker_order_id,
                user_id,
            } => write!(
                f,
                "self-trade prevented: taker {taker_order_id}, user {user_id}"
            ),
        }
    }
}

impl std::error::Error for OrderBookError {}
