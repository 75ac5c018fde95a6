//! Time-in-force semantics (spec.md §3, §4.1).

use serde::{Deserialize, Serialize};
use std::fmt;

/// How long a resting order remains eligible to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-till-cancel: rests indefinitely until filled or cancelled.
    Gtc,
    /// Immediate-or-cancel: any unfilled remainder is cancelled, never rests.
    Ioc,
    /// Fill-or-kill: the whole order fills immediately or is rejected with no
    /// side effects at all.
    Fok,
    /// Good for the trading session; expires automatically at session close.
    Day,
}

impl TimeInForce {
    /// `true` for order types that must never rest on the book after the
    /// aggression loop (`Ioc`, `Fok`).
    #[must_use]
    pub const fn rests_never(self) -> bool {
        matches!(self, TimeInForce::Ioc | TimeInForce::Fok)
    }

    /// `true` if this TIF requires an all-or-nothing dry-run check before
    /// any side effect is applied.
    #[must_use]
    pub const fn is_fill_or_kill(self) -> bool {
        matches!(self, TimeInForce::Fok)
    }

    /// `true` if this TIF is subject to automatic session-boundary expiry.
    #[must_use]
    pub const fn expires_at_session_end(self) -> bool {
        matches!(self, TimeInForce::Day)
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Day => "DAY",
        };
        write!(f, "{s}")
    }
}
