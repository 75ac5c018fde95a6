//! The core matching algorithm (spec.md §4.1 "Matching algorithm").
//!
//! Self-trade prevention only ever cancels the maker (`STPMode::CancelMaker`,
//! the sole policy spec.md wires in); the hot path costs nothing extra when
//! `STPMode::None` or `taker_user_id` is `Hash32::zero()` (anonymous).

use super::OrderBook;
use super::pool::MatchingPool;
use super::stp::{STPAction, check_stp_at_level};
use super::trade::{MatchOutcome, Trade};
use crate::orderbook::error::OrderBookError;
use crate::types::{Amount, Hash32, OrderId, OrderState, Side};

thread_local! {
    static MATCHING_POOL: MatchingPool = MatchingPool::new();
}

impl OrderBook {
    /// Walk `taker` against the opposing side in best-price-first order,
    /// consuming resting orders in FIFO order at each price level
    /// (spec.md §4.1 points 1-6).
    ///
    /// `limit_price` is `None` for a market taker: the aggression loop
    /// only halts on exhausted depth (callers apply the protection band
    /// separately, before calling this). `now_ns` timestamps every trade.
    pub fn match_order(
        &self,
        taker_order_id: OrderId,
        side: Side,
        quantity: Amount,
        limit_price: Option<Amount>,
        taker_user_id: Hash32,
        now_ns: u64,
    ) -> Result<MatchOutcome, OrderBookError> {
        self.cache.invalidate();

        let match_side = self.side_map(side.opposite());
        let stp_active = self.stp_mode.is_enabled() && !taker_user_id.is_zero();

        let mut outcome = MatchOutcome {
            taker_remaining: quantity,
            ..Default::default()
        };

        if match_side.is_empty() {
            return Ok(outcome);
        }

        let (mut filled_orders, mut emptied_prices) =
            MATCHING_POOL.with(|pool| (pool.get_filled_orders_vec(), pool.get_price_vec()));

        let prices: Vec<Amount> = match side {
            Side::Buy => match_side.iter().map(|e| *e.key()).collect(),
            Side::Sell => match_side.iter().rev().map(|e| *e.key()).collect(),
        };

        'levels: for price in prices {
            if outcome.taker_remaining.is_zero() {
                break;
            }
            if let Some(limit) = limit_price {
                match side {
                    Side::Buy if price > limit => break,
                    Side::Sell if price < limit => break,
                    _ => {}
                }
            }

            let Some(level_entry) = match_side.get(&price) else {
                continue;
            };
            let level = level_entry.value().clone();
            drop(level_entry);

            loop {
                if outcome.taker_remaining.is_zero() {
                    break;
                }
                let order_ids = level.iter_order_ids();
                if order_ids.is_empty() {
                    break;
                }

                if stp_active {
                    let level_owners: Vec<(OrderId, Hash32)> = order_ids
                        .iter()
                        .filter_map(|id| self.orders.get(id).map(|o| (*id, o.user_id)))
                        .collect();
                    if let STPAction::CancelMaker { maker_order_ids } =
                        check_stp_at_level(self.stp_mode, taker_user_id, &level_owners)
                    {
                        for maker_id in maker_order_ids {
                            level.remove(maker_id);
                            self.order_locations.remove(&maker_id);
                            if let Some(mut maker) = self.orders.get_mut(&maker_id) {
                                maker.state = OrderState::Cancelled;
                            }
                            outcome.stp_cancelled_makers.push(maker_id);
                        }
                        if level.is_empty() {
                            emptied_prices.push(price);
                            break;
                        }
                        continue;
                    }
                }

                let maker_id = order_ids[0];
                let Some(maker_remaining) = level.remaining_qty(maker_id) else {
                    continue;
                };
                let fill_qty = outcome.taker_remaining.min(maker_remaining);

                let maker_fee = self
                    .fee_schedule
                    .map(|s| s.calculate_fee(price.checked_mul_qty(fill_qty).unwrap(), true))
                    .unwrap_or(Amount::ZERO);
                let taker_fee = self
                    .fee_schedule
                    .map(|s| s.calculate_fee(price.checked_mul_qty(fill_qty).unwrap(), false))
                    .unwrap_or(Amount::ZERO);

                let maker_side = match side {
                    Side::Buy => Side::Sell,
                    Side::Sell => Side::Buy,
                };
                outcome.trades.push(Trade {
                    id: self.trade_id_generator.next(),
                    symbol: self.symbol.clone(),
                    maker_order_id: maker_id,
                    taker_order_id,
                    price,
                    qty: fill_qty,
                    maker_side,
                    ts: now_ns,
                    maker_fee,
                    taker_fee,
                });

                level.reduce(maker_id, fill_qty);
                self.with_order_mut(maker_id, |o| o.apply_fill(fill_qty));
                outcome.taker_remaining = outcome
                    .taker_remaining
                    .checked_sub(fill_qty)
                    .expect("fill cannot exceed taker remaining");
                self.record_last_trade_price(price);

                if level.remaining_qty(maker_id).is_none() {
                    self.order_locations.remove(&maker_id);
                    filled_orders.push(maker_id);
                    outcome.filled_makers.push(maker_id);
                }

                if level.is_empty() {
                    emptied_prices.push(price);
                    continue 'levels;
                }
            }
        }

        for price in emptied_prices.drain(..) {
            match_side.remove(&price);
        }
        filled_orders.clear();

        MATCHING_POOL.with(|pool| {
            pool.return_filled_orders_vec(filled_orders);
            pool.return_price_vec(emptied_prices);
        });

        if let Some(listener) = &self.trade_listener {
            for trade in &outcome.trades {
                listener(trade);
            }
        }

        self.cache.invalidate();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Symbol, SymbolConfig};

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

    fn limit_order(
        id: u64,
        user: Hash32,
        side: Side,
        price: Amount,
        qty: Amount,
    ) -> crate::types::Order {
        crate::types::Order {
            id: OrderId(id),
            user_id: user,
            symbol_key: "BTC/USD".into(),
            side,
            kind: crate::types::OrderKind::Limit {
                limit_price: price,
                post_only: false,
            },
            qty,
            filled_qty: Amount::ZERO,
            tif: crate::types::TimeInForce::Gtc,
            state: OrderState::Active,
            accepted_ts: id,
            reserved_base: Amount::ZERO,
            reserved_quote: Amount::ZERO,
            oco_sibling_id: None,
        }
    }

    #[test]
    fn crossing_limit_fills_at_maker_price() {
        let book = OrderBook::new(config());
        let maker = limit_order(1, Hash32::from_bytes(b"bob"), Side::Sell, amt("100.00"), amt("1"));
        book.insert_order_record(maker.clone());
        book.place_in_book(&maker, amt("100.00"));

        let outcome = book
            .match_order(
                OrderId(2),
                Side::Buy,
                amt("1"),
                Some(amt("100.50")),
                Hash32::from_bytes(b"alice"),
                2,
            )
            .unwrap();

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].price, amt("100.00"));
        assert!(outcome.taker_remaining.is_zero());
        assert_eq!(outcome.filled_makers, vec![OrderId(1)]);
    }

    #[test]
    fn self_trade_cancels_maker_not_taker() {
        let book = OrderBook::new(config()).with_stp_mode(super::super::stp::STPMode::CancelMaker);
        let alice = Hash32::from_bytes(b"alice");
        let maker = limit_order(1, alice, Side::Sell, amt("101.00"), amt("0.5"));
        book.insert_order_record(maker.clone());
        book.place_in_book(&maker, amt("101.00"));

        let outcome = book
            .match_order(OrderId(2), Side::Buy, amt("0.5"), Some(amt("101.00")), alice, 2)
            .unwrap();

        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.stp_cancelled_makers, vec![OrderId(1)]);
        assert_eq!(outcome.taker_remaining, amt("0.5"));
    }
}
