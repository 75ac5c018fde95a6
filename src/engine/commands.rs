//! Inbound command records (spec.md §4.4, §6 "Command surface").

use crate::types::{Amount, Hash32, OrderId, OrderKind, Side, TimeInForce};

/// A new order request, delivered through the per-symbol lock-free MPSC
/// queue (spec.md §6). The engine assigns `id` and `accepted_ts` on
/// acceptance; neither is carried here.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub client_id: u64,
    pub user_id: Hash32,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub qty: Amount,
    pub tif: TimeInForce,
    /// If the command waits in queue past this deadline it is rejected
    /// with `DeadlineExceeded` without reaching the book.
    pub deadline_ns: Option<u64>,
}

/// One command accepted onto a symbol's inbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Submit(SubmitRequest),
    Cancel { user_id: Hash32, order_id: OrderId },
    Modify {
        user_id: Hash32,
        order_id: OrderId,
        new_qty: Option<Amount>,
        new_price: Option<Amount>,
    },
    /// Session-boundary maintenance: expires `DAY` orders (spec.md §4.4).
    Tick { now_ns: u64 },
}
