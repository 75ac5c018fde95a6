//! Asset and symbol configuration (spec.md §3, §6 "Configuration").

use super::amount::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque asset code, e.g. `BTC`, `USD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Asset(code.into())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered trading pair, e.g. `BTC/USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub base: Asset,
    pub quote: Asset,
}

impl Symbol {
    #[must_use]
    pub fn new(base: impl Into<Asset>, quote: impl Into<Asset>) -> Self {
        Symbol {
            base: base.into(),
            quote: quote.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Per-symbol trading parameters (spec.md §6 `symbols` config list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: Symbol,
    /// Minimum price increment. Every `limit_price` must be an exact
    /// multiple of this.
    pub tick_size: Amount,
    /// Minimum quantity increment. Every `qty` must be an exact multiple of
    /// this.
    pub lot_size: Amount,
    /// Minimum notional (`price * qty`) an order must clear.
    pub min_notional: Amount,
    /// Largest `qty` a single order may carry.
    pub max_order_qty: Amount,
    /// Basis points beyond the current best price a market order may walk
    /// before the remainder is rejected rather than filled.
    pub protection_band_bps: u32,
}

impl SymbolConfig {
    /// `true` if `price` is a valid multiple of `tick_size`.
    #[must_use]
    pub fn is_valid_price(&self, price: Amount) -> bool {
        price.is_multiple_of(self.tick_size)
    }

    /// `true` if `qty` is a valid multiple of `lot_size`.
    #[must_use]
    pub fn is_valid_qty(&self, qty: Amount) -> bool {
        qty.is_multiple_of(self.lot_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_displays_as_pair() {
        let sym = Symbol::new("BTC", "USD");
        assert_eq!(sym.to_string(), "BTC/USD");
    }

    #[test]
    fn tick_and_lot_validation() {
        let cfg = SymbolConfig {
            symbol: Symbol::new("BTC", "USD"),
            tick_size: Amount::from_decimal_str("0.01").unwrap(),
            lot_size: Amount::from_decimal_str("0.00000001").unwrap(),
            min_notional: Amount::from_decimal_str("10").unwrap(),
            max_order_qty: Amount::from_decimal_str("1000").unwrap(),
            protection_band_bps: 50,
        };
        assert!(cfg.is_valid_price(Amount::from_decimal_str("100.01").unwrap()));
        assert!(!cfg.is_valid_price(Amount::from_decimal_str("100.015000").unwrap()));
        assert!(cfg.is_valid_qty(Amount::from_decimal_str("1.00000000").unwrap()));
    }
}
