//! Outbound event stream (spec.md §4.4, §6 "Event surface").
//!
//! Append-only per symbol: the gateway, the persistence/audit journaler,
//! and the market-data feed all consume the same stream. Every event
//! carries the symbol, a contiguous per-symbol sequence number, and a
//! wall-clock timestamp so consumers can rebuild balances and books by
//! replay (spec.md §8 "Event sequence numbers per symbol are contiguous").

use crate::orderbook::Trade;
use crate::types::{Amount, OrderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Accepted {
        order_id: OrderId,
    },
    Rejected {
        client_id: u64,
        order_id: Option<OrderId>,
        reason: String,
    },
    Resting {
        order_id: OrderId,
        price: Amount,
    },
    Trade(Trade),
    PartiallyFilled {
        order_id: OrderId,
        filled_qty: Amount,
        remaining_qty: Amount,
    },
    Filled {
        order_id: OrderId,
    },
    Cancelled {
        order_id: OrderId,
        reason: String,
    },
    Triggered {
        order_id: OrderId,
    },
    Expired {
        order_id: OrderId,
    },
    /// Final event for a symbol before it stops accepting commands
    /// (spec.md §7 "Fatal invariant violations").
    HaltedSymbol {
        reason: String,
    },
}

/// One entry in the outbound stream, stamped with the symbol's contiguous
/// sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub symbol: String,
    pub seq: u64,
    pub ts_ns: u64,
    pub kind: EventKind,
}
