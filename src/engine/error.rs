//! Engine-level errors (spec.md §7 "Client errors" taxonomy). Every
//! variant here surfaces to the caller as a `Rejected`/`Cancelled` event,
//! never as a panic or unwinding error — the engine catches these at the
//! top of [`super::MatchingEngine::process`] and converts them.

use crate::ledger::LedgerError;
use crate::orderbook::OrderBookError;
use crate::risk::RiskError;
use crate::types::OrderId;
use std::fmt;

/// A client-local failure: validation, authorization, or a pre-trade
/// check. Carries no partial side effects — the caller's reservations are
/// rolled back before this is returned (spec.md §7 "Every early return on
/// the hot path releases reservations in the exact inverse order").
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    InvalidSymbol { symbol: String },
    UnknownOrder(OrderId),
    NotOwner(OrderId),
    DeadlineExceeded,
    Risk(RiskError),
    Book(OrderBookError),
    Ledger(LedgerError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidSymbol { symbol } => write!(f, "unknown symbol: {symbol}"),
            EngineError::UnknownOrder(id) => write!(f, "unknown order: {id}"),
            EngineError::NotOwner(id) => write!(f, "caller does not own order {id}"),
            EngineError::DeadlineExceeded => write!(f, "command deadline exceeded before processing"),
            EngineError::Risk(e) => write!(f, "{e}"),
            EngineError::Book(e) => write!(f, "{e}"),
            EngineError::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RiskError> for EngineError {
    fn from(e: RiskError) -> Self {
        EngineError::Risk(e)
    }
}

impl From<OrderBookError> for EngineError {
    fn from(e: OrderBookError) -> Self {
        EngineError::Book(e)
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        EngineError::Ledger(e)
    }
}

impl EngineError {
    /// `true` for a [`LedgerError`] that must halt the owning symbol rather
    /// than surface as a plain `Rejected` (spec.md §7 "Fatal invariant
    /// violations").
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Ledger(e) if e.is_fatal())
    }
}
