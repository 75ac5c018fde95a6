//! Lazy iterators over price levels for depth analysis, in best-to-worst
//! price-priority order.

use super::price_level::PriceLevel;
use crate::types::{Amount, Side};
use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

/// A price level annotated with cumulative depth up to and including it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    pub price: Amount,
    pub quantity: Amount,
    pub cumulative_depth: Amount,
}

/// Iterates price levels best-to-worst, tracking running depth. Useful for
/// `price_at_depth`/`cumulative_depth_to_target`-style analytics.
pub struct LevelsWithCumulativeDepth<'a> {
    iter: Box<dyn Iterator<Item = crossbeam_skiplist::map::Entry<'a, Amount, Arc<PriceLevel>>> + 'a>,
    cumulative_depth: Amount,
}

impl<'a> LevelsWithCumulativeDepth<'a> {
    #[must_use]
    pub fn new(price_levels: &'a SkipMap<Amount, Arc<PriceLevel>>, side: Side) -> Self {
        let iter: Box<dyn Iterator<Item = _> + 'a> = match side {
            Side::Buy => Box::new(price_levels.iter().rev()),
            Side::Sell => Box::new(price_levels.iter()),
        };
        Self {
            iter,
            cumulative_depth: Amount::ZERO,
        }
    }
}

impl<'a> Iterator for LevelsWithCumulativeDepth<'a> {
    type Item = LevelInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|entry| {
            let price = *entry.key();
            let quantity = entry.value().total_quantity();
            self.cumulative_depth = self.cumulative_depth + quantity;
            LevelInfo {
                price,
                quantity,
                cumulative_depth: self.cumulative_depth,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: i64) -> Amount {
        Amount::from_integer(v)
    }

    #[test]
    fn cumulative_depth_accumulates_in_price_order() {
        let map: SkipMap<Amount, Arc<PriceLevel>> = SkipMap::new();
        for (price, qty) in [(100, 2), (101, 3)] {
            let level = Arc::new(PriceLevel::new(amt(price)));
            level.push_order(crate::types::OrderId(price as u64), amt(qty));
            map.insert(amt(price), level);
        }
        let levels: Vec<_> = LevelsWithCumulativeDepth::new(&map, Side::Sell).collect();
        assert_eq!(levels[0].cumulative_depth, amt(2));
        assert_eq!(levels[1].cumulative_depth, amt(5));
    }
}
