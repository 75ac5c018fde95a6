//! Per-`(account, asset)` balances and the atomic transfers the order
//! lifecycle needs (spec.md §4.2).
//!
//! Shared across every symbol (spec.md §5: "The Ledger is shared across
//! symbols"). Each `(asset, account)` pair gets its own `Mutex<Balance>`
//! behind a `DashMap` lookup, so concurrent settlement on unrelated
//! accounts/assets never contends; `settle_trade` acquires its four locks
//! in a fixed ascending `(asset, account)` order to rule out deadlock
//! (spec.md §5: "a strict asset-id ascending lock order").

mod error;

pub use error::LedgerError;

use crate::types::{Amount, Asset, Hash32};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, trace};

/// `{available, locked}` for one `(account, asset)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub available: Amount,
    pub locked: Amount,
}

impl Balance {
    #[must_use]
    pub fn total(self) -> Amount {
        self.available + self.locked
    }
}

type Key = (Asset, Hash32);

pub struct Ledger {
    balances: DashMap<Key, Arc<Mutex<Balance>>>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    fn entry_for(&self, asset: &Asset, account: Hash32) -> Arc<Mutex<Balance>> {
        self.balances
            .entry((asset.clone(), account))
            .or_insert_with(|| Arc::new(Mutex::new(Balance::default())))
            .clone()
    }

    /// Read the current balance, lazily creating it (zeroed) if the
    /// account has never been credited (spec.md §3: "created lazily on
    /// first credit").
    #[must_use]
    pub fn balance(&self, account: Hash32, asset: &Asset) -> Balance {
        *self.entry_for(asset, account).lock().expect("ledger mutex poisoned")
    }

    /// Move `amount` from `available` to `locked`.
    pub fn reserve(&self, account: Hash32, asset: &Asset, amount: Amount) -> Result<(), LedgerError> {
        let cell = self.entry_for(asset, account);
        let mut balance = cell.lock().expect("ledger mutex poisoned");
        if balance.available < amount {
            return Err(LedgerError::InsufficientAvailable {
                account,
                asset: asset.clone(),
                requested: amount,
                available: balance.available,
            });
        }
        balance.available = balance.available - amount;
        balance.locked = balance.locked + amount;
        trace!(%account, %asset, %amount, "reserved");
        Ok(())
    }

    /// Inverse of `reserve`: move `amount` from `locked` back to
    /// `available` (cancel, or unfilled residual after IOC/reject).
    pub fn release(&self, account: Hash32, asset: &Asset, amount: Amount) -> Result<(), LedgerError> {
        let cell = self.entry_for(asset, account);
        let mut balance = cell.lock().expect("ledger mutex poisoned");
        if balance.locked < amount {
            error!(%account, %asset, %amount, locked = %balance.locked, "release exceeds locked balance");
            return Err(LedgerError::InvariantViolation {
                reason: format!("release of {amount} exceeds locked balance {}", balance.locked),
            });
        }
        balance.locked = balance.locked - amount;
        balance.available = balance.available + amount;
        trace!(%account, %asset, %amount, "released");
        Ok(())
    }

    /// The four-legged atomic swap executed on every trade (spec.md §4.2):
    /// buyer pays `qty * price` of quote from `locked`, receives `qty` of
    /// base into `available`; seller pays `qty` of base from `locked`,
    /// receives `qty * price` of quote into `available`. `maker_fee`/
    /// `taker_fee` (SPEC_FULL.md §3 enrichment; zero for the plain spec.md
    /// §4.2 swap) are charged in the quote leg: the buyer pays `notional +
    /// buyer_fee`, the seller receives `notional - seller_fee`, where a
    /// negative fee is a rebate.
    ///
    /// All four mutations succeed or none do. Any negative balance or
    /// overflow is a fatal invariant breach (spec.md §4.2, §7): the caller
    /// must halt the owning symbol engine on `Err`.
    #[allow(clippy::too_many_arguments)]
    pub fn settle_trade(
        &self,
        buyer: Hash32,
        seller: Hash32,
        base_asset: &Asset,
        quote_asset: &Asset,
        qty: Amount,
        price: Amount,
        maker_is_buyer: bool,
        maker_fee: Amount,
        taker_fee: Amount,
    ) -> Result<(), LedgerError> {
        let notional = price.checked_mul_qty(qty).ok_or(LedgerError::Overflow)?;
        let (buyer_fee, seller_fee) = if maker_is_buyer {
            (maker_fee, taker_fee)
        } else {
            (taker_fee, maker_fee)
        };
        let buyer_debit = notional.checked_add(buyer_fee).ok_or(LedgerError::Overflow)?;
        let seller_credit = notional.checked_sub(seller_fee).ok_or(LedgerError::Overflow)?;

        let mut keys = vec![
            (quote_asset.clone(), buyer),
            (base_asset.clone(), buyer),
            (base_asset.clone(), seller),
            (quote_asset.clone(), seller),
        ];
        keys.sort();
        keys.dedup();

        let cells: Vec<Arc<Mutex<Balance>>> = keys
            .iter()
            .map(|(asset, account)| self.entry_for(asset, *account))
            .collect();
        let mut guards: Vec<_> = cells
            .iter()
            .map(|cell| cell.lock().expect("ledger mutex poisoned"))
            .collect();

        let idx = |asset: &Asset, account: Hash32| {
            keys.iter()
                .position(|(a, acc)| a == asset && *acc == account)
                .expect("key must be present, it was inserted above")
        };

        let buyer_quote_idx = idx(quote_asset, buyer);
        let buyer_base_idx = idx(base_asset, buyer);
        let seller_base_idx = idx(base_asset, seller);
        let seller_quote_idx = idx(quote_asset, seller);

        if guards[buyer_quote_idx].locked < buyer_debit {
            return Err(LedgerError::InvariantViolation {
                reason: format!(
                    "buyer {buyer} locked quote {} below trade debit {buyer_debit}",
                    guards[buyer_quote_idx].locked
                ),
            });
        }
        if guards[seller_base_idx].locked < qty {
            return Err(LedgerError::InvariantViolation {
                reason: format!(
                    "seller {seller} locked base {} below trade quantity {qty}",
                    guards[seller_base_idx].locked
                ),
            });
        }

        guards[buyer_quote_idx].locked = guards[buyer_quote_idx].locked - buyer_debit;
        guards[buyer_base_idx].available = guards[buyer_base_idx].available + qty;
        guards[seller_base_idx].locked = guards[seller_base_idx].locked - qty;
        guards[seller_quote_idx].available = guards[seller_quote_idx].available + seller_credit;

        drop(guards);
        trace!(%buyer, %seller, %qty, %price, "trade settled");
        Ok(())
    }

    /// Credit an external deposit. Only reachable from custody, never the
    /// matching hot path (spec.md §4.2).
    pub fn mint(&self, account: Hash32, asset: &Asset, amount: Amount) {
        let cell = self.entry_for(asset, account);
        let mut balance = cell.lock().expect("ledger mutex poisoned");
        balance.available = balance.available + amount;
    }

    /// Debit an external withdrawal. Only reachable from custody.
    pub fn burn(&self, account: Hash32, asset: &Asset, amount: Amount) -> Result<(), LedgerError> {
        let cell = self.entry_for(asset, account);
        let mut balance = cell.lock().expect("ledger mutex poisoned");
        if balance.available < amount {
            return Err(LedgerError::InsufficientAvailable {
                account,
                asset: asset.clone(),
                requested: amount,
                available: balance.available,
            });
        }
        balance.available = balance.available - amount;
        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: i64) -> Amount {
        Amount::from_integer(v)
    }

    #[test]
    fn reserve_and_release_round_trip() {
        let ledger = Ledger::new();
        let acct = Hash32::from_bytes(b"alice");
        let usd = Asset::new("USD");
        ledger.mint(acct, &usd, amt(1000));
        ledger.reserve(acct, &usd, amt(100)).unwrap();
        assert_eq!(ledger.balance(acct, &usd).locked, amt(100));
        ledger.release(acct, &usd, amt(100)).unwrap();
        assert_eq!(ledger.balance(acct, &usd).available, amt(1000));
        assert_eq!(ledger.balance(acct, &usd).locked, Amount::ZERO);
    }

    #[test]
    fn reserve_beyond_available_is_rejected() {
        let ledger = Ledger::new();
        let acct = Hash32::from_bytes(b"alice");
        let usd = Asset::new("USD");
        ledger.mint(acct, &usd, amt(10));
        let err = ledger.reserve(acct, &usd, amt(100)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAvailable { .. }));
    }

    #[test]
    fn settle_trade_conserves_total_across_both_assets() {
        let ledger = Ledger::new();
        let buyer = Hash32::from_bytes(b"alice");
        let seller = Hash32::from_bytes(b"bob");
        let btc = Asset::new("BTC");
        let usd = Asset::new("USD");

        ledger.mint(buyer, &usd, amt(10_000));
        ledger.mint(seller, &btc, amt(5));

        ledger.reserve(buyer, &usd, amt(1000)).unwrap();
        ledger.reserve(seller, &btc, amt(1)).unwrap();

        ledger
            .settle_trade(buyer, seller, &btc, &usd, amt(1), amt(1000), true, Amount::ZERO, Amount::ZERO)
            .unwrap();

        assert_eq!(ledger.balance(buyer, &btc).available, amt(1));
        assert_eq!(ledger.balance(buyer, &usd).locked, Amount::ZERO);
        assert_eq!(ledger.balance(seller, &usd).available, amt(1000));
        assert_eq!(ledger.balance(seller, &btc).locked, Amount::ZERO);

        let total_usd = ledger.balance(buyer, &usd).total() + ledger.balance(seller, &usd).total();
        assert_eq!(total_usd, amt(10_000));
        let total_btc = ledger.balance(buyer, &btc).total() + ledger.balance(seller, &btc).total();
        assert_eq!(total_btc, amt(5));
    }

    #[test]
    fn settle_trade_charges_taker_fee_and_pays_maker_rebate() {
        let ledger = Ledger::new();
        let buyer = Hash32::from_bytes(b"alice");
        let seller = Hash32::from_bytes(b"bob");
        let btc = Asset::new("BTC");
        let usd = Asset::new("USD");

        ledger.mint(buyer, &usd, amt(10_000));
        ledger.mint(seller, &btc, amt(5));
        ledger.reserve(buyer, &usd, amt(1010)).unwrap();
        ledger.reserve(seller, &btc, amt(1)).unwrap();

        // Buyer is the taker (pays 10), seller is the maker (earns a 2 rebate).
        ledger
            .settle_trade(buyer, seller, &btc, &usd, amt(1), amt(1000), false, amt(-2), amt(10))
            .unwrap();

        assert_eq!(ledger.balance(buyer, &usd).locked, amt(0));
        assert_eq!(ledger.balance(seller, &usd).available, amt(1002));
    }

    #[test]
    fn settle_trade_without_reservation_is_fatal() {
        let ledger = Ledger::new();
        let buyer = Hash32::from_bytes(b"alice");
        let seller = Hash32::from_bytes(b"bob");
        let btc = Asset::new("BTC");
        let usd = Asset::new("USD");

        let err = ledger
            .settle_trade(buyer, seller, &btc, &usd, amt(1), amt(1000), true, Amount::ZERO, Amount::ZERO)
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
