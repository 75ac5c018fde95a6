//! Engine-wide startup configuration (spec.md §6 "Configuration").
//!
//! Deserialized with `serde`/`serde_json`; there is no dedicated config
//! file format beyond JSON (or whatever a caller's own deployment tooling
//! produces, as long as it matches this schema). A malformed or
//! out-of-range config is a startup-time `ConfigError`, never a panic.

use crate::types::{Amount, SymbolConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// `{per_symbol_queue_depth, event_ring_depth, rate_limit_default}`
/// (spec.md §6 `engine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTuning {
    pub per_symbol_queue_depth: usize,
    pub event_ring_depth: usize,
    /// Default token-bucket burst size for a user with no explicit tier
    /// override (spec.md §4.5 "per-user token bucket").
    pub rate_limit_default: u32,
}

/// `{max_position, max_daily_loss, max_order_size, max_leverage}`, named so
/// a config file can refer to a tier by name (spec.md §6 `risk.tiers`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTierConfig {
    pub name: String,
    pub max_position: Amount,
    pub max_daily_loss: Amount,
    pub max_order_size: Amount,
    pub max_leverage: u32,
}

/// `{start, end, timezone}` controlling `DAY` order expiry (spec.md §6
/// `session`). `start`/`end` are minutes since local midnight; the engine
/// itself is timezone-naive (the gateway is responsible for converting
/// wall-clock `Tick` boundaries into the engine's `now_ns`), so `timezone`
/// is carried through only for the benefit of external tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub timezone: String,
}

/// `cancel_maker` is the only policy spec.md wires into the engine; other
/// variants are accepted by the schema and rejected at validation time
/// (spec.md §6 "reserved for future extension").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTradePolicy {
    CancelMaker,
    CancelTaker,
    CancelBoth,
}

impl fmt::Display for SelfTradePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelfTradePolicy::CancelMaker => "cancel_maker",
            SelfTradePolicy::CancelTaker => "cancel_taker",
            SelfTradePolicy::CancelBoth => "cancel_both",
        };
        write!(f, "{s}")
    }
}

/// The full startup configuration for an engine instance (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub symbols: Vec<SymbolConfig>,
    pub engine: EngineTuning,
    pub risk_tiers: Vec<RiskTierConfig>,
    pub session: SessionConfig,
    pub self_trade_policy: SelfTradePolicy,
}

/// Errors produced loading or validating an [`EngineConfig`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// The config parsed but failed a semantic check (spec.md §9 "only
    /// `cancel_maker` is implemented"; duplicate symbols; empty tier list).
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl EngineConfig {
    /// Parse and validate a config from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON, or
    /// [`ConfigError::Invalid`] if the parsed config fails validation.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or the
    /// errors [`Self::from_json`] can produce.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Semantic validation beyond what serde's shape check catches
    /// (spec.md §9 Open Questions: only `cancel_maker` is wired in today).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first failing
    /// check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("at least one symbol must be configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for sym in &self.symbols {
            let key = sym.symbol.to_string();
            if !seen.insert(key.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate symbol configured: {key}")));
            }
        }
        if self.risk_tiers.is_empty() {
            return Err(ConfigError::Invalid("at least one risk tier must be configured".into()));
        }
        if self.session.start_minutes >= self.session.end_minutes {
            return Err(ConfigError::Invalid(
                "session.start_minutes must be before session.end_minutes".into(),
            ));
        }
        if self.self_trade_policy != SelfTradePolicy::CancelMaker {
            return Err(ConfigError::Invalid(format!(
                "self_trade_policy {} is not implemented; only cancel_maker is wired into the engine",
                self.self_trade_policy
            )));
        }
        Ok(())
    }
}
