//! # apex-clob
//!
//! A central limit order book matching-and-settlement core: per-symbol
//! price-time-priority order books, a rich conditional/trigger order-type
//! state machine, self-trade prevention, and a synchronous settlement
//! ledger that atomically transfers custody of base and quote assets on
//! every fill.
//!
//! ## Scope
//!
//! This crate is the matching-and-settlement pipeline — it does not
//! include the gateway (HTTP/WebSocket transport, request auth, session
//! management), persistent storage beyond the append-only
//! [`sequencer::Journal`] abstraction, or a UI. Those are built on top of
//! the [`engine::MatchingEngine`] this crate provides.
//!
//! ## Architecture
//!
//! - [`types`] — shared value types: the fixed-point [`types::Amount`],
//!   identities, assets/symbols, the closed [`types::OrderKind`] sum type.
//! - [`orderbook`] — [`orderbook::OrderBook`]: the price-time-priority
//!   matching core for one symbol.
//! - [`triggers`] — [`triggers::TriggerRegistry`]: conditional-order
//!   promotion, iceberg slice re-issue, OCO pairing.
//! - [`ledger`] — [`ledger::Ledger`]: per-`(account, asset)` balances and
//!   atomic trade settlement.
//! - [`risk`] — [`risk::RiskGate`]: pre-trade size/position/loss/rate
//!   checks.
//! - [`engine`] — [`engine::MatchingEngine`]: the per-symbol executor that
//!   ties the above together into the command/event surface.
//! - [`sequencer`] — an append-only [`sequencer::Journal`] abstraction over
//!   the event stream, for external replay and audit.
//! - [`config`] — startup configuration (symbols, risk tiers, session,
//!   self-trade policy).
//!
//! One [`engine::MatchingEngine`] owns exactly one symbol's book and
//! trigger registry; multiple engines share one [`ledger::Ledger`] and one
//! [`risk::RiskGate`], each pinned to its own executor (a thread or a
//! cooperatively scheduled task), consulted through `Arc` without any lock
//! held across await/yield points on the per-symbol hot path.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod orderbook;
pub mod prelude;
pub mod risk;
pub mod sequencer;
pub mod triggers;
pub mod types;
mod utils;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Command, EngineError, EventEnvelope, EventKind, MatchingEngine, SubmitRequest};
pub use ledger::{Balance, Ledger, LedgerError};
pub use orderbook::{FeeSchedule, OrderBook, OrderBookError, OrderBookSnapshot, STPMode};
pub use risk::{RiskError, RiskGate, RiskTier};
pub use sequencer::{Journal, JournalError};
pub use triggers::TriggerRegistry;
pub use types::{
    Amount, Asset, Hash32, Order, OrderId, OrderKind, OrderState, Side, Symbol, SymbolConfig, TimeInForce,
    TrailOffset,
};
pub use utils::{current_time_millis, current_time_nanos};
