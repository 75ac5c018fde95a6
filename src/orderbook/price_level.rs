//! A single price level: a FIFO queue of resting orders plus O(1)
//! id-indexed lookup.
//!
//! Structure: `crossbeam::queue::SegQueue<OrderId>` carries FIFO order for
//! iteration and head access; `dashmap::DashMap<OrderId, Amount>` tracks
//! each resting order's remaining quantity for O(1) lookup/removal without
//! scanning the queue. Cancelling from the middle of a level happens via
//! the map (the entry is marked gone); the queue is compacted lazily the
//! next time it is drained.

use crate::types::{Amount, OrderId};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;

/// `{price, total_qty, FIFO queue of active order handles}` (spec.md §3).
/// Invariant: `total_qty == sum of remaining_qty` of all still-present ids.
#[derive(Debug)]
pub struct PriceLevel {
    price: Amount,
    queue: SegQueue<OrderId>,
    remaining: DashMap<OrderId, Amount>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Amount) -> Self {
        Self {
            price,
            queue: SegQueue::new(),
            remaining: DashMap::new(),
        }
    }

    #[must_use]
    pub fn price(&self) -> Amount {
        self.price
    }

    /// Append an order to the tail of the FIFO queue.
    pub fn push_order(&self, order_id: OrderId, remaining_qty: Amount) {
        self.remaining.insert(order_id, remaining_qty);
        self.queue.push(order_id);
    }

    /// Current remaining quantity for `order_id`, if it is still resting.
    #[must_use]
    pub fn remaining_qty(&self, order_id: OrderId) -> Option<Amount> {
        self.remaining.get(&order_id).map(|r| *r)
    }

    /// Reduce `order_id`'s remaining quantity by `qty` (a partial or full
    /// fill). Removes the order once it reaches zero. Returns the new
    /// remaining quantity, or `None` if the order was not present.
    pub fn reduce(&self, order_id: OrderId, qty: Amount) -> Option<Amount> {
        let mut entry = self.remaining.get_mut(&order_id)?;
        *entry = entry.checked_sub(qty).expect("fill cannot exceed resting quantity");
        let left = *entry;
        drop(entry);
        if left.is_zero() {
            self.remaining.remove(&order_id);
        }
        Some(left)
    }

    /// Remove `order_id` unconditionally (full cancel). The queue entry is
    /// left in place and skipped lazily during iteration/draining.
    pub fn remove(&self, order_id: OrderId) -> bool {
        self.remaining.remove(&order_id).is_some()
    }

    /// Number of orders still resting at this level.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.remaining.len()
    }

    /// `true` once every order at this level has been removed or fully
    /// filled; the caller should delete the level (spec.md §3: "empty
    /// levels are deleted").
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Total quantity resting at this level: `sum(remaining_qty)`.
    #[must_use]
    pub fn total_quantity(&self) -> Amount {
        self.remaining
            .iter()
            .fold(Amount::ZERO, |acc, entry| acc + *entry.value())
    }

    /// Order ids still present, in FIFO (price-time priority) order.
    /// Compacts the internal queue of any stale (already-removed) entries
    /// it encounters along the way.
    pub fn iter_order_ids(&self) -> Vec<OrderId> {
        let mut live = Vec::with_capacity(self.remaining.len());
        let mut stale = Vec::new();
        while let Some(id) = self.queue.pop() {
            if self.remaining.contains_key(&id) {
                live.push(id);
            } else {
                stale.push(id);
            }
        }
        for id in &live {
            self.queue.push(*id);
        }
        live
    }

    /// The head (oldest, highest time priority) order id still resting.
    #[must_use]
    pub fn peek_head(&self) -> Option<OrderId> {
        self.iter_order_ids().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: i64) -> Amount {
        Amount::from_integer(v)
    }

    #[test]
    fn fifo_order_is_preserved() {
        let level = PriceLevel::new(amt(100));
        level.push_order(OrderId(1), amt(5));
        level.push_order(OrderId(2), amt(3));
        assert_eq!(level.iter_order_ids(), vec![OrderId(1), OrderId(2)]);
        assert_eq!(level.total_quantity(), amt(8));
    }

    #[test]
    fn reduce_to_zero_removes_order() {
        let level = PriceLevel::new(amt(100));
        level.push_order(OrderId(1), amt(5));
        assert_eq!(level.reduce(OrderId(1), amt(5)), Some(Amount::ZERO));
        assert!(level.is_empty());
    }

    #[test]
    fn partial_reduce_keeps_order_resting() {
        let level = PriceLevel::new(amt(100));
        level.push_order(OrderId(1), amt(5));
        assert_eq!(level.reduce(OrderId(1), amt(2)), Some(amt(3)));
        assert!(!level.is_empty());
        assert_eq!(level.remaining_qty(OrderId(1)), Some(amt(3)));
    }

    #[test]
    fn cancel_skips_stale_queue_entries() {
        let level = PriceLevel::new(amt(100));
        level.push_order(OrderId(1), amt(5));
        level.push_order(OrderId(2), amt(5));
        level.remove(OrderId(1));
        assert_eq!(level.iter_order_ids(), vec![OrderId(2)]);
    }
}
