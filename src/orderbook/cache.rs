//! Lock-free best-bid/best-ask memoization so `best_bid`/`best_ask` stay
//! O(1) without walking the `SkipMap` on every call.

use crate::types::Amount;
use crossbeam::atomic::AtomicCell;

/// Caches the last known best bid/ask so repeated reads between mutations
/// avoid a `SkipMap` traversal. Invalidated on any insert/cancel/match that
/// could change the head of either side.
#[derive(Debug)]
pub struct PriceLevelCache {
    best_bid: AtomicCell<Option<Amount>>,
    best_ask: AtomicCell<Option<Amount>>,
}

impl PriceLevelCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            best_bid: AtomicCell::new(None),
            best_ask: AtomicCell::new(None),
        }
    }

    /// Returns the cached best bid, if the cache currently holds one.
    #[must_use]
    pub fn get_cached_best_bid(&self) -> Option<Amount> {
        self.best_bid.load()
    }

    /// Returns the cached best ask, if the cache currently holds one.
    #[must_use]
    pub fn get_cached_best_ask(&self) -> Option<Amount> {
        self.best_ask.load()
    }

    /// Update whichever side is `Some`, leaving the other untouched.
    pub fn update_best_prices(&self, bid: Option<Amount>, ask: Option<Amount>) {
        if bid.is_some() {
            self.best_bid.store(bid);
        }
        if ask.is_some() {
            self.best_ask.store(ask);
        }
    }

    /// Drop both cached values; the next read re-derives from the book.
    pub fn invalidate(&self) {
        self.best_bid.store(None);
        self.best_ask.store(None);
    }
}

impl Default for PriceLevelCache {
    fn default() -> Self {
        Self::new()
    }
}
