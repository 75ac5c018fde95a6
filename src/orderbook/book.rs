//! Core `OrderBook`: two price-indexed priority structures for one symbol
//! (spec.md §3 "PriceLevel", §4.1 "OrderBook").

use super::cache::PriceLevelCache;
use super::error::OrderBookError;
use super::fees::FeeSchedule;
use super::price_level::PriceLevel;
use super::stp::STPMode;
use super::trade::TradeListener;
use crate::types::{Amount, Order, OrderId, Side, SymbolConfig, TradeIdGenerator};
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Maintains two price-indexed priority structures (`bids`, `asks`) for one
/// trading symbol and the full order table backing them.
///
/// `bids`/`asks` are `SkipMap<Amount, Arc<PriceLevel>>`: ordered by price,
/// so the best bid is the last entry and the best ask is the first — no
/// sort is ever needed. Concurrent reads (snapshots, analytics) are safe
/// while the owning symbol executor is the sole mutator (spec.md §5).
pub struct OrderBook {
    pub(super) symbol: String,
    pub(super) config: SymbolConfig,
    pub(super) bids: SkipMap<Amount, Arc<PriceLevel>>,
    pub(super) asks: SkipMap<Amount, Arc<PriceLevel>>,
    /// order id -> (price, side), for O(1) cancel without a level scan.
    pub(super) order_locations: DashMap<OrderId, (Amount, Side)>,
    /// The full order table; price levels only hold ids + a remaining-qty
    /// shadow for fast depth aggregation (see [`PriceLevel`]).
    pub(super) orders: DashMap<OrderId, Order>,
    pub(super) trade_id_generator: TradeIdGenerator,
    pub(super) last_trade_price: AtomicCell<Option<Amount>>,
    pub(super) cache: PriceLevelCache,
    pub trade_listener: Option<TradeListener>,
    pub(super) stp_mode: STPMode,
    pub(super) fee_schedule: Option<FeeSchedule>,
}

impl OrderBook {
    #[must_use]
    pub fn new(config: SymbolConfig) -> Self {
        let symbol = config.symbol.to_string();
        Self {
            symbol,
            config,
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            order_locations: DashMap::new(),
            orders: DashMap::new(),
            trade_id_generator: TradeIdGenerator::new(),
            last_trade_price: AtomicCell::new(None),
            cache: PriceLevelCache::new(),
            trade_listener: None,
            stp_mode: STPMode::None,
            fee_schedule: None,
        }
    }

    #[must_use]
    pub fn with_stp_mode(mut self, mode: STPMode) -> Self {
        self.stp_mode = mode;
        self
    }

    #[must_use]
    pub fn with_fee_schedule(mut self, schedule: FeeSchedule) -> Self {
        self.fee_schedule = Some(schedule);
        self
    }

    #[must_use]
    pub fn with_trade_listener(mut self, listener: TradeListener) -> Self {
        self.trade_listener = Some(listener);
        self
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub fn config(&self) -> &SymbolConfig {
        &self.config
    }

    #[must_use]
    pub fn stp_mode(&self) -> STPMode {
        self.stp_mode
    }

    /// O(1) best bid peek (highest price), via the cache or the `SkipMap`'s
    /// tail entry.
    #[must_use]
    pub fn best_bid(&self) -> Option<Amount> {
        if let Some(cached) = self.cache.get_cached_best_bid() {
            return Some(cached);
        }
        let best = self.bids.iter().next_back().map(|entry| *entry.key());
        self.cache.update_best_prices(best, None);
        best
    }

    /// O(1) best ask peek (lowest price), via the cache or the `SkipMap`'s
    /// head entry.
    #[must_use]
    pub fn best_ask(&self) -> Option<Amount> {
        if let Some(cached) = self.cache.get_cached_best_ask() {
            return Some(cached);
        }
        let best = self.asks.iter().next().map(|entry| *entry.key());
        self.cache.update_best_prices(None, best);
        best
    }

    #[must_use]
    pub fn mid_price(&self) -> Option<Amount> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(Amount::from_raw((bid.raw() + ask.raw()) / 2))
    }

    #[must_use]
    pub fn spread(&self) -> Option<Amount> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(ask - bid)
    }

    #[must_use]
    pub fn last_trade_price(&self) -> Option<Amount> {
        self.last_trade_price.load()
    }

    pub(super) fn record_last_trade_price(&self, price: Amount) {
        self.last_trade_price.store(Some(price));
    }

    /// `true` whenever both sides are non-empty and `best_bid >= best_ask`
    /// — the invariant spec.md §8 forbids; used only by tests/diagnostics.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    pub(super) fn side_map(&self, side: Side) -> &SkipMap<Amount, Arc<PriceLevel>> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Validate tick size, lot size, and min notional for a would-be order.
    /// Does not check `max_order_qty` (callers check that against the full
    /// hidden quantity for icebergs, not just the display slice).
    pub(super) fn validate_price_and_qty(
        &self,
        price: Option<Amount>,
        qty: Amount,
    ) -> Result<(), OrderBookError> {
        if let Some(price) = price {
            if !self.config.is_valid_price(price) {
                return Err(OrderBookError::TickSizeViolation {
                    price,
                    tick_size: self.config.tick_size,
                });
            }
            let notional = price
                .checked_mul_qty(qty)
                .expect("notional calculation must not overflow");
            if notional < self.config.min_notional {
                return Err(OrderBookError::MinNotionalViolation {
                    notional,
                    min_notional: self.config.min_notional,
                });
            }
        }
        if !self.config.is_valid_qty(qty) {
            return Err(OrderBookError::LotSizeViolation {
                quantity: qty,
                lot_size: self.config.lot_size,
            });
        }
        if qty > self.config.max_order_qty {
            return Err(OrderBookError::OrderSizeOutOfRange {
                quantity: qty,
                max: self.config.max_order_qty,
            });
        }
        Ok(())
    }

    /// Validate tick size, lot size, min notional, and max order quantity
    /// for a would-be order. Exposed for the owning engine to check before
    /// it ever builds an `Order` record (spec.md §4.4 "validate").
    pub fn validate_order(&self, price: Option<Amount>, qty: Amount) -> Result<(), OrderBookError> {
        self.validate_price_and_qty(price, qty)
    }

    /// Shrink an order's outstanding reservation by the amount a trade just
    /// settled against it (spec.md §4.2 "partial fills adjust the
    /// reservation in lockstep"). Applies to both legs of a trade — the
    /// resting maker and the matching taker are both book-resident at the
    /// moment a trade is recorded. Saturates at zero rather than
    /// underflowing; a reservation can never be shrunk twice for the same
    /// fill since each trade is settled exactly once.
    pub fn decrement_reservation(
        &self,
        order_id: OrderId,
        base_delta: Amount,
        quote_delta: Amount,
    ) -> Option<()> {
        self.with_order_mut(order_id, |o| {
            o.reserved_base = o.reserved_base.checked_sub(base_delta).unwrap_or(Amount::ZERO);
            o.reserved_quote = o.reserved_quote.checked_sub(quote_delta).unwrap_or(Amount::ZERO);
        })
    }

    /// Shrink a resting order's displayed quantity in place, without
    /// disturbing its position in the price level's FIFO queue (spec.md §8
    /// round-trip law: a `Modify` that only reduces quantity preserves
    /// `accepted_ts` and, with it, time priority). `reduce_by` must not
    /// exceed the order's current remaining quantity.
    pub fn reduce_resting_quantity(
        &self,
        order_id: OrderId,
        reduce_by: Amount,
    ) -> Result<(), OrderBookError> {
        let (price, side) = *self
            .order_locations
            .get(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        let level = self
            .side_map(side)
            .get(&price)
            .map(|e| e.value().clone())
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        level.reduce(order_id, reduce_by);
        self.with_order_mut(order_id, |o| {
            o.qty = o.qty.checked_sub(reduce_by).unwrap_or(o.qty);
        });
        self.cache.invalidate();
        Ok(())
    }

    /// Set `oco_sibling_id` on an order already resting in the book, without
    /// touching its `OrderKind` (spec.md §4.3 point 5). Returns `false` if
    /// the order is not on this book.
    pub fn tag_oco_sibling(&self, order_id: OrderId, sibling_id: OrderId) -> bool {
        self.with_order_mut(order_id, |o| o.oco_sibling_id = Some(sibling_id))
            .is_some()
    }

    /// Cancel every resting `DAY` order (spec.md §4.4 `Tick` "expires DAY
    /// orders"). Returns the cancelled orders so the engine can release
    /// their reservations and emit `Expired` events.
    pub fn expire_day_orders(&self) -> Vec<Order> {
        let day_order_ids: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|e| !e.state.is_terminal() && e.tif == crate::types::TimeInForce::Day)
            .map(|e| e.id)
            .collect();
        let mut expired = Vec::with_capacity(day_order_ids.len());
        for id in day_order_ids {
            if let Some(mut entry) = self.orders.get_mut(&id) {
                entry.state = crate::types::OrderState::Expired;
                expired.push(entry.clone());
            }
            self.remove_from_book(id);
        }
        expired
    }

    /// Place a resting order at the tail of its price level's FIFO queue,
    /// creating the level if this is the first order at that price.
    pub(super) fn place_in_book(&self, order: &Order, price: Amount) {
        self.place_slice_in_book(order, price, order.remaining_qty());
    }

    /// Like [`Self::place_in_book`], but the level only carries `slice_qty`
    /// rather than the order's full remaining quantity. Used for iceberg
    /// display slices, where `order.qty` is the full hidden size but only
    /// `display_qty` is ever visible on the book at once.
    pub(super) fn place_slice_in_book(&self, order: &Order, price: Amount, slice_qty: Amount) {
        let side = order.side;
        let level = self
            .side_map(side)
            .get_or_insert(price, Arc::new(PriceLevel::new(price)))
            .value()
            .clone();
        level.push_order(order.id, slice_qty);
        self.order_locations.insert(order.id, (price, side));
        self.cache.invalidate();
        trace!(symbol = %self.symbol, order_id = %order.id, %price, %slice_qty, "order resting");
    }

    /// Remove `order_id` from its price level, deleting the level if it is
    /// left empty (spec.md §3: "empty levels are deleted").
    pub(super) fn remove_from_book(&self, order_id: OrderId) {
        let Some((_, (price, side))) = self.order_locations.remove(&order_id) else {
            return;
        };
        let map = self.side_map(side);
        let emptied = if let Some(entry) = map.get(&price) {
            let level = entry.value().clone();
            level.remove(order_id);
            level.is_empty()
        } else {
            false
        };
        if emptied {
            map.remove(&price);
        }
        self.cache.invalidate();
    }

    /// Cancel a resting order. `NotOwner` authorization is the engine's
    /// responsibility; the book only checks existence and terminal state.
    pub fn cancel(&self, order_id: OrderId) -> Result<Order, OrderBookError> {
        let order = {
            let mut entry = self
                .orders
                .get_mut(&order_id)
                .ok_or(OrderBookError::OrderNotFound(order_id))?;
            if entry.state.is_terminal() {
                return Err(OrderBookError::AlreadyTerminal(order_id));
            }
            entry.state = crate::types::OrderState::Cancelled;
            entry.clone()
        };
        self.remove_from_book(order_id);
        Ok(order)
    }

    pub(super) fn insert_order_record(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    #[must_use]
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|e| e.clone())
    }

    pub(super) fn with_order_mut<R>(
        &self,
        order_id: OrderId,
        f: impl FnOnce(&mut Order) -> R,
    ) -> Option<R> {
        self.orders.get_mut(&order_id).map(|mut e| f(&mut e))
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.iter().filter(|e| !e.state.is_terminal()).count()
    }
}
