//! Submits a resting offer and a crossing bid through a single-symbol
//! engine and prints the resulting event stream.

use apex_clob::prelude::*;
use std::sync::Arc;

fn amt(s: &str) -> Amount {
    Amount::from_decimal_str(s).unwrap()
}

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let symbol = SymbolConfig {
        symbol: Symbol::new("BTC", "USD"),
        tick_size: amt("0.01"),
        lot_size: amt("0.00000001"),
        min_notional: Amount::ZERO,
        max_order_qty: amt("1000"),
        protection_band_bps: 200,
    };

    let ledger = Arc::new(Ledger::new());
    let tier = RiskTier {
        max_position: amt("1000"),
        max_daily_loss: amt("100000"),
        max_order_size: amt("100"),
        max_leverage: 10,
    };
    let risk = Arc::new(RiskGate::new(tier, 1000, 1000.0));
    let mut engine = MatchingEngine::new(symbol, ledger.clone(), risk);

    let usd = Asset::new("USD");
    let btc = Asset::new("BTC");
    let maker = Hash32::from_bytes(b"maker");
    let taker = Hash32::from_bytes(b"taker");
    for user in [maker, taker] {
        ledger.mint(user, &usd, amt("10000"));
        ledger.mint(user, &btc, amt("10"));
    }

    let sell = Command::Submit(SubmitRequest {
        client_id: 1,
        user_id: maker,
        symbol: "BTC/USD".into(),
        side: Side::Sell,
        kind: OrderKind::Limit {
            limit_price: amt("100.00"),
            post_only: false,
        },
        qty: amt("1"),
        tif: TimeInForce::Gtc,
        deadline_ns: None,
    });
    for event in engine.process(sell, 1) {
        println!("{event:?}");
    }

    let buy = Command::Submit(SubmitRequest {
        client_id: 2,
        user_id: taker,
        symbol: "BTC/USD".into(),
        side: Side::Buy,
        kind: OrderKind::Limit {
            limit_price: amt("100.00"),
            post_only: false,
        },
        qty: amt("1"),
        tif: TimeInForce::Gtc,
        deadline_ns: None,
    });
    for event in engine.process(buy, 2) {
        println!("{event:?}");
    }

    println!(
        "taker BTC available: {}",
        ledger.balance(taker, &btc).available.to_f64()
    );
    println!(
        "maker USD available: {}",
        ledger.balance(maker, &usd).available.to_f64()
    );
}
