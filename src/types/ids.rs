//! Identity types: order ids, user ids, and trade ids.
//!
//! `OrderId` is the engine's monotonic 64-bit identifier (spec.md §3: "assigned
//! by the engine"); `Hash32` is an opaque, fixed-width account/user identity;
//! `TradeId` mints transaction ids with `uuid`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Monotonic order identifier assigned by a symbol's `MatchingEngine`.
///
/// Ordering of `OrderId` values has no semantic meaning beyond uniqueness;
/// time priority is carried separately by `accepted_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ord-{}", self.0)
    }
}

/// Per-symbol generator for strictly increasing `OrderId`s and `accepted_ts`
/// nanosecond timestamps.
///
/// Owned exclusively by one symbol's `MatchingEngine`; never shared across
/// symbols (spec.md §5: "The monotonic id/timestamp counter is per-symbol").
#[derive(Debug, Default)]
pub struct IdGenerator {
    next_id: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose first issued id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue the next `OrderId`. Strictly increasing, never reused.
    pub fn next_order_id(&self) -> OrderId {
        OrderId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// A 32-byte opaque identity, used for user/account ids.
///
/// `Hash32::zero()` is the sentinel "anonymous" identity: orders carrying it
/// always bypass self-trade prevention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    /// The sentinel "no identity" value.
    #[must_use]
    pub const fn zero() -> Self {
        Hash32([0u8; 32])
    }

    /// `true` if this is the sentinel zero identity.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Derive a stable `Hash32` from an arbitrary byte string (e.g. an
    /// external account id). Used at the gateway boundary, never on the hot
    /// path (the engine only ever compares already-minted `Hash32`s).
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash32(out)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "…")
    }
}

/// Account identity used by the ledger; an alias of `Hash32` so gateway-side
/// user ids and ledger account ids are interchangeable.
pub type UserId = Hash32;

/// Unique identifier for a single trade (one maker/taker pairing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(pub Uuid);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generator for unique `TradeId`s, namespaced per order book so two books
/// can mint ids independently without coordinating a shared counter.
#[derive(Debug)]
pub struct TradeIdGenerator {
    namespace: Uuid,
    counter: AtomicU64,
}

impl TradeIdGenerator {
    /// Create a generator scoped to a fresh random namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: Uuid::new_v4(),
            counter: AtomicU64::new(0),
        }
    }

    /// Mint the next `TradeId`, deterministic given the namespace and counter
    /// so that replay reproduces identical trade ids.
    pub fn next(&self) -> TradeId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = seq.to_le_bytes();
        TradeId(Uuid::new_v5(&self.namespace, &name))
    }
}

impl Default for TradeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
