//! Ledger error types.

use crate::types::{Amount, Asset, Hash32};
use std::fmt;

/// Errors produced by [`super::Ledger`] operations.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LedgerError {
    /// `reserve` requested more than is currently `available` (spec.md §4.2:
    /// "checked, non-fatal").
    InsufficientAvailable {
        account: Hash32,
        asset: Asset,
        requested: Amount,
        available: Amount,
    },
    /// A fatal invariant breach: a mutation would drive `available` or
    /// `locked` negative, or conservation across the two legs of a trade
    /// would not hold. Per spec.md §7, this halts the owning symbol.
    InvariantViolation { reason: String },
    /// An arithmetic operation overflowed `i128`. Always fatal.
    Overflow,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InsufficientAvailable {
                account,
                asset,
                requested,
                available,
            } => write!(
                f,
                "insufficient available balance for {account} in {asset}: requested {requested}, available {available}"
            ),
            LedgerError::InvariantViolation { reason } => {
                write!(f, "ledger invariant violation: {reason}")
            }
            LedgerError::Overflow => write!(f, "ledger arithmetic overflow"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    /// `true` for errors that must halt the symbol engine rather than
    /// surface as a `Rejected` event (spec.md §7 "Fatal invariant
    /// violations").
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::InvariantViolation { .. } | LedgerError::Overflow
        )
    }
}
