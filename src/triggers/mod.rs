//! Conditional-order registry: stop/stop-limit/trailing-stop/take-profit
//! promotion, iceberg slice re-issue, OCO pairing (spec.md §4.3).
//!
//! One registry per symbol, owned by that symbol's `MatchingEngine`. Two
//! `SkipMap` indexes keyed by `(trigger_price, accepted_ts)` give the
//! strict firing order spec.md §4.3 requires without a separate sort step.

use crate::types::{Amount, Order, OrderId, OrderKind, Side, TriggerExecStyle};
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::ops::Bound;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerDirection {
    /// Fires when the last-trade price rises to or above the trigger
    /// (buy-stop, sell-take-profit).
    Above,
    /// Fires when the last-trade price falls to or below the trigger
    /// (sell-stop, buy-take-profit).
    Below,
}

#[derive(Debug, Clone)]
struct TriggerEntry {
    order: Order,
    direction: TriggerDirection,
    trigger_price: Amount,
}

/// Tracks the hidden total across every slice of one iceberg order. The
/// book-level `Order` row only ever represents the currently displayed
/// slice (`qty`/`filled_qty` reset on each re-issue); this struct is the
/// source of truth for the full order.
#[derive(Debug, Clone, Copy)]
struct IcebergState {
    display_qty: Amount,
    limit_price: Amount,
    total_qty: Amount,
    total_filled: Amount,
}

/// An order extracted from the registry, ready to be re-submitted to the
/// engine as a new taker (spec.md §4.3 point 1).
#[derive(Debug, Clone)]
pub struct Promotion {
    pub order: Order,
    pub exec_style: TriggerExecStyle,
    pub exec_price: Option<Amount>,
}

/// Per-symbol index of pending conditional orders.
pub struct TriggerRegistry {
    above: SkipMap<(Amount, u64), OrderId>,
    below: SkipMap<(Amount, u64), OrderId>,
    entries: DashMap<OrderId, TriggerEntry>,
    oco_siblings: DashMap<OrderId, OrderId>,
    iceberg_states: DashMap<OrderId, IcebergState>,
}

impl TriggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            above: SkipMap::new(),
            below: SkipMap::new(),
            entries: DashMap::new(),
            oco_siblings: DashMap::new(),
            iceberg_states: DashMap::new(),
        }
    }

    fn direction_for(order: &Order) -> TriggerDirection {
        match (order.kind.dispatch_kind(), order.side) {
            (OrderKind::Stop { .. } | OrderKind::StopLimit { .. }, Side::Buy) => {
                TriggerDirection::Above
            }
            (OrderKind::Stop { .. } | OrderKind::StopLimit { .. }, Side::Sell) => {
                TriggerDirection::Below
            }
            (OrderKind::TakeProfit { .. }, Side::Sell) => TriggerDirection::Above,
            (OrderKind::TakeProfit { .. }, Side::Buy) => TriggerDirection::Below,
            (OrderKind::TrailingStop { .. }, Side::Buy) => TriggerDirection::Above,
            (OrderKind::TrailingStop { .. }, Side::Sell) => TriggerDirection::Below,
            _ => panic!("direction_for called on a non-triggerable order kind"),
        }
    }

    fn trigger_price_for(order: &Order) -> Amount {
        match order.kind.dispatch_kind() {
            OrderKind::Stop { stop_price } | OrderKind::StopLimit { stop_price, .. } => {
                *stop_price
            }
            OrderKind::TakeProfit { trigger_price, .. } => *trigger_price,
            OrderKind::TrailingStop {
                trail,
                high_water_mark,
            } => {
                let delta = trail.delta(*high_water_mark);
                match order.side {
                    Side::Sell => *high_water_mark - delta,
                    Side::Buy => *high_water_mark + delta,
                }
            }
            _ => panic!("trigger_price_for called on a non-triggerable order kind"),
        }
    }

    /// Index a newly accepted conditional order (spec.md §4.4: "(new) →
    /// pending_trigger").
    pub fn register(&self, order: Order) {
        let direction = Self::direction_for(&order);
        let trigger_price = Self::trigger_price_for(&order);
        let key = (trigger_price, order.accepted_ts);
        let id = order.id;
        match direction {
            TriggerDirection::Above => self.above.insert(key, id),
            TriggerDirection::Below => self.below.insert(key, id),
        };
        trace!(order_id = %id, %trigger_price, "trigger registered");
        self.entries.insert(
            id,
            TriggerEntry {
                order,
                direction,
                trigger_price,
            },
        );
    }

    /// Pair two OCO legs so that firing or cancelling one releases the
    /// other (spec.md §4.3 point 5).
    pub fn register_oco(&self, a: OrderId, b: OrderId) {
        self.oco_siblings.insert(a, b);
        self.oco_siblings.insert(b, a);
    }

    #[must_use]
    pub fn sibling_of(&self, order_id: OrderId) -> Option<OrderId> {
        self.oco_siblings.get(&order_id).map(|e| *e)
    }

    /// Set `oco_sibling_id` on a still-pending order, without touching its
    /// `OrderKind`. Returns `false` if `order_id` is not pending.
    pub fn tag_oco_sibling(&self, order_id: OrderId, sibling_id: OrderId) -> bool {
        match self.entries.get_mut(&order_id) {
            Some(mut entry) => {
                entry.order.oco_sibling_id = Some(sibling_id);
                true
            }
            None => false,
        }
    }

    /// Drop an order from the registry without firing it (explicit cancel,
    /// or release of an OCO sibling). Returns the order if it was pending.
    pub fn remove(&self, order_id: OrderId) -> Option<Order> {
        let (_, entry) = self.entries.remove(&order_id)?;
        let key = (entry.trigger_price, entry.order.accepted_ts);
        match entry.direction {
            TriggerDirection::Above => self.above.remove(&key),
            TriggerDirection::Below => self.below.remove(&key),
        };
        self.oco_siblings.remove(&order_id);
        self.iceberg_states.remove(&order_id);
        Some(entry.order)
    }

    /// Record a newly accepted iceberg order: `total_qty` is the full
    /// hidden size (reserved in full at acceptance, spec.md §4.2), of which
    /// only `display_qty` is ever visible on the book at once.
    pub fn register_iceberg(
        &self,
        order_id: OrderId,
        limit_price: Amount,
        display_qty: Amount,
        total_qty: Amount,
    ) {
        self.iceberg_states.insert(
            order_id,
            IcebergState {
                display_qty,
                limit_price,
                total_qty,
                total_filled: Amount::ZERO,
            },
        );
    }

    /// Advance the hidden total by the amount just filled on the current
    /// displayed slice.
    pub fn record_iceberg_fill(&self, order_id: OrderId, filled: Amount) {
        if let Some(mut state) = self.iceberg_states.get_mut(&order_id) {
            state.total_filled = state.total_filled + filled;
        }
    }

    /// Called once an iceberg's currently displayed slice has been fully
    /// consumed. Returns the size of the next slice to re-issue, or `None`
    /// if the hidden reserve is exhausted (spec.md §4.3 point 4).
    #[must_use]
    pub fn next_iceberg_slice(&self, order_id: OrderId) -> Option<Amount> {
        let state = self.iceberg_states.get(&order_id)?;
        let remaining = state
            .total_qty
            .checked_sub(state.total_filled)
            .unwrap_or(Amount::ZERO);
        if remaining.is_zero() {
            return None;
        }
        Some(if remaining < state.display_qty {
            remaining
        } else {
            state.display_qty
        })
    }

    #[must_use]
    pub fn iceberg_limit_price(&self, order_id: OrderId) -> Option<Amount> {
        self.iceberg_states.get(&order_id).map(|s| s.limit_price)
    }

    /// Full hidden quantity still unfilled across every slice of an
    /// iceberg, for releasing its reservation on cancel. `None` if
    /// `order_id` is not a live iceberg.
    #[must_use]
    pub fn iceberg_remaining(&self, order_id: OrderId) -> Option<Amount> {
        let state = self.iceberg_states.get(&order_id)?;
        Some(state.total_qty.checked_sub(state.total_filled).unwrap_or(Amount::ZERO))
    }

    pub fn forget_iceberg(&self, order_id: OrderId) {
        self.iceberg_states.remove(&order_id);
    }

    /// Recompute every pending trailing-stop's effective trigger price
    /// against the new last-trade price, reinserting at the new key if it
    /// moved (spec.md §4.3 point 3, §9 "recomputed on every trade").
    fn retrail(&self, last_trade_price: Amount) {
        for mut entry in self.entries.iter_mut() {
            let order_id = *entry.key();
            let trig = entry.value_mut();
            let OrderKind::TrailingStop {
                trail,
                high_water_mark,
            } = trig.order.kind.dispatch_kind_mut()
            else {
                continue;
            };
            let extreme_moved = match trig.order.side {
                Side::Sell => last_trade_price > *high_water_mark,
                Side::Buy => last_trade_price < *high_water_mark,
            };
            if !extreme_moved {
                continue;
            }
            *high_water_mark = last_trade_price;
            let delta = trail.delta(*high_water_mark);
            let new_trigger_price = match trig.order.side {
                Side::Sell => *high_water_mark - delta,
                Side::Buy => *high_water_mark + delta,
            };
            if new_trigger_price == trig.trigger_price {
                continue;
            }
            let old_key = (trig.trigger_price, trig.order.accepted_ts);
            let new_key = (new_trigger_price, trig.order.accepted_ts);
            let idx = match trig.direction {
                TriggerDirection::Above => &self.above,
                TriggerDirection::Below => &self.below,
            };
            idx.remove(&old_key);
            idx.insert(new_key, order_id);
            trig.trigger_price = new_trigger_price;
        }
    }

    /// Scan both indexes against the new last-trade price, extracting every
    /// order whose condition is now met in strict `(trigger_price,
    /// accepted_ts)` order (spec.md §4.3 points 1-2).
    pub fn poll(&self, last_trade_price: Amount) -> Vec<Promotion> {
        self.retrail(last_trade_price);
        let mut fired = Vec::new();

        let above_keys: Vec<(Amount, u64)> = self
            .above
            .range((Bound::Unbounded, Bound::Included((last_trade_price, u64::MAX))))
            .map(|e| *e.key())
            .collect();
        for key in above_keys {
            if let Some(entry) = self.above.remove(&key) {
                let order_id = *entry.value();
                if let Some((_, trig)) = self.entries.remove(&order_id) {
                    fired.push(promote(trig.order));
                }
            }
        }

        let below_keys: Vec<(Amount, u64)> = self
            .below
            .range((Bound::Included((last_trade_price, 0)), Bound::Unbounded))
            .map(|e| *e.key())
            .collect();
        for key in below_keys {
            if let Some(entry) = self.below.remove(&key) {
                let order_id = *entry.value();
                if let Some((_, trig)) = self.entries.remove(&order_id) {
                    fired.push(promote(trig.order));
                }
            }
        }

        fired
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn promote(order: Order) -> Promotion {
    let (exec_style, exec_price) = match order.kind.dispatch_kind() {
        OrderKind::Stop { .. } | OrderKind::TrailingStop { .. } => (TriggerExecStyle::Market, None),
        OrderKind::StopLimit { limit_price, .. } => (TriggerExecStyle::Limit, Some(*limit_price)),
        OrderKind::TakeProfit { exec, limit_price, .. } => (*exec, *limit_price),
        _ => (TriggerExecStyle::Market, None),
    };
    Promotion {
        order,
        exec_style,
        exec_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash32, OrderId, OrderState, TimeInForce};

    fn amt(s: &str) -> Amount {
        Amount::from_decimal_str(s).unwrap()
    }

    fn stop_order(id: u64, side: Side, stop_price: Amount, ts: u64) -> Order {
        Order {
            id: OrderId(id),
            user_id: Hash32::zero(),
            symbol_key: "BTC/USD".into(),
            side,
            kind: OrderKind::Stop { stop_price },
            qty: amt("1"),
            filled_qty: Amount::ZERO,
            tif: TimeInForce::Gtc,
            state: OrderState::PendingTrigger,
            accepted_ts: ts,
            reserved_base: Amount::ZERO,
            reserved_quote: Amount::ZERO,
            oco_sibling_id: None,
        }
    }

    #[test]
    fn buy_stop_fires_on_price_rising_through_trigger() {
        let reg = TriggerRegistry::new();
        reg.register(stop_order(1, Side::Buy, amt("101.00"), 1));
        assert!(reg.poll(amt("100.00")).is_empty());
        let fired = reg.poll(amt("101.00"));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].order.id, OrderId(1));
    }

    #[test]
    fn sell_stop_fires_on_price_falling_through_trigger() {
        let reg = TriggerRegistry::new();
        reg.register(stop_order(2, Side::Sell, amt("96.00"), 1));
        assert!(reg.poll(amt("97.00")).is_empty());
        let fired = reg.poll(amt("95.00"));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn fires_in_trigger_price_then_accepted_ts_order() {
        let reg = TriggerRegistry::new();
        reg.register(stop_order(1, Side::Buy, amt("101.00"), 5));
        reg.register(stop_order(2, Side::Buy, amt("100.00"), 10));
        reg.register(stop_order(3, Side::Buy, amt("100.00"), 1));
        let fired = reg.poll(amt("101.00"));
        let ids: Vec<u64> = fired.iter().map(|p| p.order.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn oco_sibling_lookup_round_trips() {
        let reg = TriggerRegistry::new();
        reg.register_oco(OrderId(1), OrderId(2));
        assert_eq!(reg.sibling_of(OrderId(1)), Some(OrderId(2)));
        assert_eq!(reg.sibling_of(OrderId(2)), Some(OrderId(1)));
    }

    fn trailing_stop_order(id: u64, side: Side, trail: crate::types::TrailOffset, hwm: Amount) -> Order {
        Order {
            id: OrderId(id),
            user_id: Hash32::zero(),
            symbol_key: "BTC/USD".into(),
            side,
            kind: OrderKind::TrailingStop {
                trail,
                high_water_mark: hwm,
            },
            qty: amt("1"),
            filled_qty: Amount::ZERO,
            tif: TimeInForce::Gtc,
            state: OrderState::PendingTrigger,
            accepted_ts: id,
            reserved_base: Amount::ZERO,
            reserved_quote: Amount::ZERO,
            oco_sibling_id: None,
        }
    }

    #[test]
    fn trailing_stop_with_absolute_trail_fires_on_pullback() {
        let reg = TriggerRegistry::new();
        reg.register(trailing_stop_order(
            1,
            Side::Sell,
            crate::types::TrailOffset::Amount(amt("2.00")),
            amt("100.00"),
        ));
        // Rises to 105: water mark follows, trigger re-centers at 103.
        assert!(reg.poll(amt("105.00")).is_empty());
        assert!(reg.poll(amt("104.00")).is_empty());
        let fired = reg.poll(amt("103.00"));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn trailing_stop_with_percent_trail_recomputes_against_new_high_water_mark() {
        let reg = TriggerRegistry::new();
        reg.register(trailing_stop_order(
            1,
            Side::Sell,
            crate::types::TrailOffset::PercentBps(1_000),
            amt("100.00"),
        ));
        // Price rises to 105: high-water mark moves to 105 and the trigger
        // re-centers at 10% below it (94.50), not 10% below the original 100.
        assert!(reg.poll(amt("105.00")).is_empty());
        let fired = reg.poll(amt("94.50"));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn iceberg_next_slice_caps_at_remaining_quantity() {
        let reg = TriggerRegistry::new();
        let id = OrderId(9);
        reg.register_iceberg(id, amt("100.00"), amt("1.00000000"), amt("2.50000000"));
        reg.record_iceberg_fill(id, amt("2.00000000"));
        assert_eq!(reg.next_iceberg_slice(id), Some(amt("0.50000000")));
        reg.record_iceberg_fill(id, amt("0.50000000"));
        assert_eq!(reg.next_iceberg_slice(id), None);
    }
}
