//! Convenience re-export of the crate's most commonly used types.
//!
//! ```
//! use apex_clob::prelude::*;
//! ```

pub use crate::config::{ConfigError, EngineConfig, RiskTierConfig, SelfTradePolicy, SessionConfig};
pub use crate::engine::{Command, EngineError, EventEnvelope, EventKind, MatchingEngine, SubmitRequest};
pub use crate::ledger::{Balance, Ledger, LedgerError};
pub use crate::orderbook::{FeeSchedule, OrderBook, OrderBookError, OrderBookSnapshot, STPMode};
pub use crate::risk::{RiskError, RiskGate, RiskTier};
pub use crate::sequencer::{Journal, JournalError};
#[cfg(feature = "journal")]
pub use crate::sequencer::FileJournal;
pub use crate::triggers::TriggerRegistry;
pub use crate::types::{
    Amount, Asset, Hash32, Order, OrderId, OrderKind, OrderState, Side, Symbol, SymbolConfig, TimeInForce,
    TrailOffset, TriggerExecStyle, UserId,
};
pub use crate::utils::{current_time_millis, current_time_nanos};
