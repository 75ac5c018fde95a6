use apex_clob::prelude::*;

// `Amount` serializes as its raw 10^-8-scaled `i128`, not as a decimal
// string (see `types::Amount`), so every amount field below is the plain
// integer form of the commented decimal.
fn sample_json() -> &'static str {
    r#"{
        "symbols": [{
            "symbol": {"base": "BTC", "quote": "USD"},
            "tick_size": 1000000,
            "lot_size": 1,
            "min_notional": 1000000000,
            "max_order_qty": 100000000000,
            "protection_band_bps": 200
        }],
        "engine": {
            "per_symbol_queue_depth": 65536,
            "event_ring_depth": 65536,
            "rate_limit_default": 1000
        },
        "risk_tiers": [{
            "name": "default",
            "max_position": 100000000000,
            "max_daily_loss": 5000000000000,
            "max_order_size": 10000000000,
            "max_leverage": 10
        }],
        "session": {
            "start_minutes": 0,
            "end_minutes": 1440,
            "timezone": "UTC"
        },
        "self_trade_policy": "cancel_maker"
    }"#
}

#[test]
fn loads_a_well_formed_config() {
    let config = EngineConfig::from_json(sample_json()).expect("should parse and validate");
    assert_eq!(config.symbols.len(), 1);
    assert_eq!(config.risk_tiers[0].name, "default");
    assert_eq!(config.self_trade_policy, SelfTradePolicy::CancelMaker);
}

#[test]
fn rejects_malformed_json() {
    let err = EngineConfig::from_json("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn rejects_a_policy_other_than_cancel_maker() {
    let json = sample_json().replace("cancel_maker", "cancel_both");
    let err = EngineConfig::from_json(&json).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn rejects_an_inverted_session_window() {
    let json = sample_json().replace("\"start_minutes\": 0", "\"start_minutes\": 2000");
    let err = EngineConfig::from_json(&json).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
