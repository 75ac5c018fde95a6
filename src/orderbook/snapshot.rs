//! Depth-N market-data snapshots (spec.md §4.1 "snapshot(depth n)", §6
//! "Market-data snapshots").

use super::OrderBook;
use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// One aggregated price level as exposed to market-data consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: Amount,
    pub total_qty: Amount,
}

/// Top-N depth snapshot plus last-trade price, taken at a consistent point
/// between two command processings (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub timestamp_ms: u64,
    pub bids: Vec<LevelSnapshot>,
    pub asks: Vec<LevelSnapshot>,
    pub last_trade_price: Option<Amount>,
}

impl OrderBookSnapshot {
    #[must_use]
    pub fn best_bid(&self) -> Option<LevelSnapshot> {
        self.bids.first().copied()
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<LevelSnapshot> {
        self.asks.first().copied()
    }

    #[must_use]
    pub fn spread(&self) -> Option<Amount> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

impl OrderBook {
    /// Copy the top-`depth` price levels per side with aggregated
    /// quantity (spec.md §4.1 `snapshot(depth n)`).
    #[must_use]
    pub fn snapshot(&self, depth: usize, timestamp_ms: u64) -> OrderBookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|entry| LevelSnapshot {
                price: *entry.key(),
                total_qty: entry.value().total_quantity(),
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|entry| LevelSnapshot {
                price: *entry.key(),
                total_qty: entry.value().total_quantity(),
            })
            .collect();
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            timestamp_ms,
            bids,
            asks,
            last_trade_price: self.last_trade_price(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, OrderId, OrderKind, OrderState, Side, Symbol, SymbolConfig, TimeInForce};
    use crate::types::Hash32;

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

    #[test]
    fn snapshot_orders_bids_descending_and_asks_ascending() {
        let book = OrderBook::new(config());
        for (id, price) in [(1, "99.00"), (2, "100.00")] {
            let o = Order {
                id: OrderId(id),
                user_id: Hash32::zero(),
                symbol_key: "BTC/USD".into(),
                side: Side::Buy,
                kind: OrderKind::Limit {
                    limit_price: amt(price),
                    post_only: false,
                },
                qty: amt("1"),
                filled_qty: Amount::ZERO,
                tif: TimeInForce::Gtc,
                state: OrderState::Active,
                accepted_ts: id,
                reserved_base: Amount::ZERO,
                reserved_quote: Amount::ZERO,
                oco_sibling_id: None,
            };
            book.insert_order_record(o.clone());
            book.place_in_book(&o, amt(price));
        }

        let snap = book.snapshot(10, 1);
        assert_eq!(snap.bids[0].price, amt("100.00"));
        assert_eq!(snap.bids[1].price, amt("99.00"));
    }
}
