//! Pre-trade risk checks and per-user rate limiting (spec.md §4.5).
//!
//! Stateless-per-request except for the running counters the spec
//! requires (open notional, position, daily P&L, token bucket) — those
//! live here, one `Mutex`-guarded record per user, consulted synchronously
//! between `accepted_ts` assignment and reservation (spec.md §4.4).

use crate::types::{Amount, Hash32, Side};
use dashmap::DashMap;
use std::fmt;
use std::sync::Mutex;

/// A risk tier's limits (spec.md §6 `risk.tiers`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskTier {
    pub max_position: Amount,
    pub max_daily_loss: Amount,
    pub max_order_size: Amount,
    pub max_leverage: u32,
}

/// Errors a risk check can produce; all surface as `Rejected(reason)`
/// without touching the book or ledger (spec.md §4.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RiskError {
    OrderSizeExceeded,
    PositionLimitExceeded,
    DailyLossLimitExceeded,
    RateLimited,
}

impl fmt::Display for RiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskError::OrderSizeExceeded => "order size exceeds tier limit",
            RiskError::PositionLimitExceeded => "resulting position exceeds tier limit",
            RiskError::DailyLossLimitExceeded => "daily loss limit breached",
            RiskError::RateLimited => "rate limit exceeded",
        };
        write!(f, "{s}")
    }
}

impl std::error::Error for RiskError {}

/// Refills continuously at `refill_per_ns`, driven by explicit timestamps
/// rather than wall-clock reads so replay stays deterministic.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_ns: f64,
    last_refill_ns: u64,
}

impl TokenBucket {
    fn new(burst: u32, refill_per_sec: f64, now_ns: u64) -> Self {
        Self {
            capacity: f64::from(burst),
            tokens: f64::from(burst),
            refill_per_ns: refill_per_sec / 1_000_000_000.0,
            last_refill_ns: now_ns,
        }
    }

    fn try_take(&mut self, now_ns: u64) -> bool {
        let elapsed = now_ns.saturating_sub(self.last_refill_ns) as f64;
        self.tokens = (self.tokens + elapsed * self.refill_per_ns).min(self.capacity);
        self.last_refill_ns = now_ns;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct UserState {
    tier: RiskTier,
    /// Position per symbol, signed: positive long, negative short.
    positions: DashMap<String, Amount>,
    open_notional: Amount,
    realized_pnl_today: Amount,
    bucket: TokenBucket,
}

/// Per-user pre-trade risk state for every symbol (spec.md §4.5: "Operates
/// only on data local to a user").
pub struct RiskGate {
    users: DashMap<Hash32, Mutex<UserState>>,
    default_tier: RiskTier,
    rate_limit_refill_per_sec: f64,
    rate_limit_burst: u32,
}

impl RiskGate {
    #[must_use]
    pub fn new(default_tier: RiskTier, rate_limit_burst: u32, rate_limit_refill_per_sec: f64) -> Self {
        Self {
            users: DashMap::new(),
            default_tier,
            rate_limit_refill_per_sec,
            rate_limit_burst,
        }
    }

    fn state_for(&self, user_id: Hash32, now_ns: u64) -> dashmap::mapref::one::Ref<'_, Hash32, Mutex<UserState>> {
        if !self.users.contains_key(&user_id) {
            self.users.entry(user_id).or_insert_with(|| {
                Mutex::new(UserState {
                    tier: self.default_tier,
                    positions: DashMap::new(),
                    open_notional: Amount::ZERO,
                    realized_pnl_today: Amount::ZERO,
                    bucket: TokenBucket::new(self.rate_limit_burst, self.rate_limit_refill_per_sec, now_ns),
                })
            });
        }
        self.users.get(&user_id).expect("just inserted above")
    }

    /// Assign a non-default tier to a user (e.g. after a KYC tier upgrade
    /// external to this core).
    pub fn set_tier(&self, user_id: Hash32, tier: RiskTier, now_ns: u64) {
        let cell = self.state_for(user_id, now_ns);
        cell.lock().expect("risk mutex poisoned").tier = tier;
    }

    /// The full pre-trade gate: order size, resulting position, daily
    /// loss, and rate limit, in that order (spec.md §4.4). On success the
    /// token is consumed and `open_notional` is debited; the caller must
    /// call [`Self::release_open_notional`] on cancel/reject/fill.
    pub fn check_submit(
        &self,
        user_id: Hash32,
        symbol: &str,
        side: Side,
        qty: Amount,
        notional: Amount,
        now_ns: u64,
    ) -> Result<(), RiskError> {
        let cell = self.state_for(user_id, now_ns);
        let mut state = cell.lock().expect("risk mutex poisoned");

        if !state.bucket.try_take(now_ns) {
            return Err(RiskError::RateLimited);
        }
        if qty > state.tier.max_order_size {
            return Err(RiskError::OrderSizeExceeded);
        }
        let current_position = state
            .positions
            .get(symbol)
            .map(|e| *e)
            .unwrap_or(Amount::ZERO);
        let signed_delta = match side {
            Side::Buy => qty,
            Side::Sell => -qty,
        };
        let resulting = current_position + signed_delta;
        let resulting_abs = if resulting.is_negative() { -resulting } else { resulting };
        if resulting_abs > state.tier.max_position {
            return Err(RiskError::PositionLimitExceeded);
        }
        if state.realized_pnl_today.is_negative() {
            let loss = -state.realized_pnl_today;
            if loss > state.tier.max_daily_loss {
                return Err(RiskError::DailyLossLimitExceeded);
            }
        }

        state.open_notional = state.open_notional + notional;
        Ok(())
    }

    /// Release previously-debited open notional (cancel, reject, or fill
    /// consuming the reservation).
    pub fn release_open_notional(&self, user_id: Hash32, notional: Amount, now_ns: u64) {
        let cell = self.state_for(user_id, now_ns);
        let mut state = cell.lock().expect("risk mutex poisoned");
        state.open_notional = state
            .open_notional
            .checked_sub(notional)
            .unwrap_or(Amount::ZERO);
    }

    /// Update the user's signed position for `symbol` after a fill.
    pub fn record_fill(&self, user_id: Hash32, symbol: &str, side: Side, qty: Amount, now_ns: u64) {
        let cell = self.state_for(user_id, now_ns);
        let state = cell.lock().expect("risk mutex poisoned");
        let signed_delta = match side {
            Side::Buy => qty,
            Side::Sell => -qty,
        };
        state
            .positions
            .entry(symbol.to_string())
            .and_modify(|p| *p = *p + signed_delta)
            .or_insert(signed_delta);
    }

    /// Accumulate realized P&L for the running daily-loss check.
    pub fn record_realized_pnl(&self, user_id: Hash32, delta: Amount, now_ns: u64) {
        let cell = self.state_for(user_id, now_ns);
        let mut state = cell.lock().expect("risk mutex poisoned");
        state.realized_pnl_today = state.realized_pnl_today + delta;
    }

    /// Session rollover: reset the daily P&L accumulator (spec.md §6
    /// `session: {start, end, timezone}`, driven by a `Tick` command).
    pub fn reset_daily_pnl(&self, user_id: Hash32, now_ns: u64) {
        let cell = self.state_for(user_id, now_ns);
        let mut state = cell.lock().expect("risk mutex poisoned");
        state.realized_pnl_today = Amount::ZERO;
    }

    /// Roll over every known user's daily P&L accumulator.
    pub fn reset_all_daily_pnl(&self) {
        for cell in self.users.iter() {
            cell.value().lock().expect("risk mutex poisoned").realized_pnl_today = Amount::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> Amount {
        Amount::from_decimal_str(s).unwrap()
    }

    fn tier() -> RiskTier {
        RiskTier {
            max_position: amt("100"),
            max_daily_loss: amt("1000"),
            max_order_size: amt("10"),
            max_leverage: 5,
        }
    }

    #[test]
    fn order_exceeding_max_size_is_rejected() {
        let gate = RiskGate::new(tier(), 100, 1000.0);
        let err = gate
            .check_submit(Hash32::zero(), "BTC/USD", Side::Buy, amt("20"), amt("2000"), 0)
            .unwrap_err();
        assert_eq!(err, RiskError::OrderSizeExceeded);
    }

    #[test]
    fn position_limit_blocks_excess_accumulation() {
        let gate = RiskGate::new(tier(), 100, 1000.0);
        gate.record_fill(Hash32::zero(), "BTC/USD", Side::Buy, amt("95"), 0);
        let err = gate
            .check_submit(Hash32::zero(), "BTC/USD", Side::Buy, amt("10"), amt("1000"), 0)
            .unwrap_err();
        assert_eq!(err, RiskError::PositionLimitExceeded);
    }

    #[test]
    fn daily_loss_beyond_tier_blocks_new_orders() {
        let gate = RiskGate::new(tier(), 100, 1000.0);
        gate.record_realized_pnl(Hash32::zero(), amt("-1500"), 0);
        let err = gate
            .check_submit(Hash32::zero(), "BTC/USD", Side::Buy, amt("1"), amt("100"), 0)
            .unwrap_err();
        assert_eq!(err, RiskError::DailyLossLimitExceeded);
    }

    #[test]
    fn token_bucket_blocks_bursts_beyond_capacity() {
        let gate = RiskGate::new(tier(), 1, 1.0);
        gate.check_submit(Hash32::zero(), "BTC/USD", Side::Buy, amt("1"), amt("100"), 0)
            .unwrap();
        let err = gate
            .check_submit(Hash32::zero(), "BTC/USD", Side::Buy, amt("1"), amt("100"), 0)
            .unwrap_err();
        assert_eq!(err, RiskError::RateLimited);
    }
}
