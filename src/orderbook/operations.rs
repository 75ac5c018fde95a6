//! Entry points that submit an order into the book: apply the aggression
//! loop, then apply time-in-force semantics to whatever remains
//! (spec.md §4.1 "Time-in-force semantics applied after the aggression
//! loop").
//!
//! These operate purely on book state (price levels, the order table).
//! Reservation, risk-checking, and trigger-registry consultation are the
//! owning `MatchingEngine`'s responsibility (spec.md §4.4).

use super::OrderBook;
use super::error::OrderBookError;
use super::trade::MatchOutcome;
use crate::types::{Amount, Order, OrderState};

/// Outcome of submitting one order into the book via [`OrderBook::submit`].
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub match_outcome: MatchOutcome,
    /// `true` if a non-zero remainder was placed on the book.
    pub rested: bool,
}

impl OrderBook {
    /// Submit `order` (already validated, reserved, and assigned `id` /
    /// `accepted_ts` by the engine) for matching and, if applicable,
    /// resting.
    ///
    /// `limit_price` is the taker's crossing boundary (`None` for a
    /// pre-validated market order whose protection-band limit the caller
    /// has already translated into a concrete price, or truly `None` when
    /// no band is configured).
    pub fn submit(
        &self,
        mut order: Order,
        limit_price: Option<Amount>,
        now_ns: u64,
    ) -> Result<SubmitOutcome, OrderBookError> {
        if order.kind.is_post_only() {
            if let Some(price) = limit_price {
                let crosses = match order.side {
                    crate::types::Side::Buy => {
                        self.best_ask().is_some_and(|ask| ask <= price)
                    }
                    crate::types::Side::Sell => {
                        self.best_bid().is_some_and(|bid| bid >= price)
                    }
                };
                if crosses {
                    return Err(OrderBookError::PostOnlyCrossed {
                        side: order.side,
                        price,
                        opposite_price: match order.side {
                            crate::types::Side::Buy => self.best_ask().unwrap(),
                            crate::types::Side::Sell => self.best_bid().unwrap(),
                        },
                    });
                }
            }
        }

        if order.tif.is_fill_or_kill() {
            let fillable = self.fillable_quantity(order.side, order.remaining_qty(), limit_price);
            if fillable < order.remaining_qty() {
                return Err(OrderBookError::FokUnfillable);
            }
        }

        self.insert_order_record(order.clone());
        let starting_remaining = order.remaining_qty();
        let outcome = self.match_order(
            order.id,
            order.side,
            starting_remaining,
            limit_price,
            order.user_id,
            now_ns,
        )?;

        // `match_order` only advances makers' `filled_qty` through the shared
        // order table; the taker's own record still reflects zero fill, so
        // apply the taker's side of the ledger here before re-reading state.
        let taker_filled = starting_remaining
            .checked_sub(outcome.taker_remaining)
            .expect("taker cannot fill more than its starting remaining quantity");
        if !taker_filled.is_zero() {
            self.with_order_mut(order.id, |o| o.apply_fill(taker_filled));
        }
        order = self.get_order(order.id).expect("order just inserted");

        let rested = if order.is_fully_filled() {
            false
        } else if order.tif.rests_never() {
            self.with_order_mut(order.id, |o| o.state = OrderState::Cancelled);
            false
        } else {
            self.with_order_mut(order.id, |o| {
                o.state = if o.filled_qty.is_zero() {
                    OrderState::Active
                } else {
                    OrderState::PartiallyFilled
                }
            });
            if let Some(price) = order.kind.limit_price() {
                let display_qty = match order.kind.dispatch_kind() {
                    crate::types::OrderKind::Iceberg { display_qty, .. } => Some(*display_qty),
                    _ => None,
                };
                match display_qty {
                    Some(display_qty) => {
                        self.place_slice_in_book(&order, price, display_qty.min(order.remaining_qty()))
                    }
                    None => self.place_in_book(&order, price),
                }
            }
            true
        };

        Ok(SubmitOutcome {
            match_outcome: outcome,
            rested,
        })
    }

    /// Quantity obtainable from the opposing side without crossing
    /// `limit_price` (used for the FOK dry-run pre-check, spec.md §4.1).
    fn fillable_quantity(
        &self,
        side: crate::types::Side,
        up_to: Amount,
        limit_price: Option<Amount>,
    ) -> Amount {
        let match_side = self.side_map(side.opposite());
        let mut total = Amount::ZERO;
        let prices: Vec<Amount> = match side {
            crate::types::Side::Buy => match_side.iter().map(|e| *e.key()).collect(),
            crate::types::Side::Sell => match_side.iter().rev().map(|e| *e.key()).collect(),
        };
        for price in prices {
            if total >= up_to {
                break;
            }
            if let Some(limit) = limit_price {
                match side {
                    crate::types::Side::Buy if price > limit => break,
                    crate::types::Side::Sell if price < limit => break,
                    _ => {}
                }
            }
            if let Some(entry) = match_side.get(&price) {
                total = total + entry.value().total_quantity();
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash32, OrderId, OrderKind, Side, Symbol, SymbolConfig, TimeInForce};

    fn config() -> SymbolConfig {
        SymbolConfig {
            symbol: Symbol::new("BTC", "USD"),
            tick_size: Amount::from_decimal_str("0.01").unwrap(),
            lot_size: Amount::from_decimal_str("0.00000001").unwrap(),
            min_notional: Amount::ZERO,
            max_order_qty: Amount::from_integer(1_000_000),
            protection_band_bps: 50,
        }
    }

    fn amt(s: &str) -> Amount {
        Amount::from_decimal_str(s).unwrap()
    }

    fn order(id: u64, side: Side, price: Amount, qty: Amount, tif: TimeInForce) -> Order {
        Order {
            id: OrderId(id),
            user_id: Hash32::zero(),
            symbol_key: "BTC/USD".into(),
            side,
            kind: OrderKind::Limit {
                limit_price: price,
                post_only: false,
            },
            qty,
            filled_qty: Amount::ZERO,
            tif,
            state: OrderState::New,
            accepted_ts: id,
            reserved_base: Amount::ZERO,
            reserved_quote: Amount::ZERO,
            oco_sibling_id: None,
        }
    }

    #[test]
    fn gtc_remainder_rests() {
        let book = OrderBook::new(config());
        let o = order(1, Side::Buy, amt("100.00"), amt("1"), TimeInForce::Gtc);
        let outcome = book.submit(o, Some(amt("100.00")), 1).unwrap();
        assert!(outcome.rested);
        assert_eq!(book.best_bid(), Some(amt("100.00")));
    }

    #[test]
    fn ioc_remainder_never_rests() {
        let book = OrderBook::new(config());
        let o = order(1, Side::Buy, amt("100.00"), amt("1"), TimeInForce::Ioc);
        let outcome = book.submit(o, Some(amt("100.00")), 1).unwrap();
        assert!(!outcome.rested);
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn fok_rejects_when_depth_insufficient() {
        let book = OrderBook::new(config());
        let resting = order(1, Side::Sell, amt("100.00"), amt("0.3"), TimeInForce::Gtc);
        book.submit(resting, Some(amt("100.00")), 1).unwrap();

        let taker = order(2, Side::Buy, amt("100.00"), amt("0.5"), TimeInForce::Fok);
        let err = book.submit(taker, Some(amt("100.00")), 2).unwrap_err();
        assert!(matches!(err, OrderBookError::FokUnfillable));
        assert_eq!(book.best_ask(), Some(amt("100.00")));
    }

    #[test]
    fn fok_fills_exactly_when_depth_matches() {
        let book = OrderBook::new(config());
        let resting = order(1, Side::Sell, amt("100.00"), amt("0.5"), TimeInForce::Gtc);
        book.submit(resting, Some(amt("100.00")), 1).unwrap();

        let taker = order(2, Side::Buy, amt("100.00"), amt("0.5"), TimeInForce::Fok);
        let outcome = book.submit(taker, Some(amt("100.00")), 2).unwrap();
        assert!(!outcome.rested);
        assert_eq!(outcome.match_outcome.trades.len(), 1);
        assert_eq!(book.best_ask(), None);
    }
}
