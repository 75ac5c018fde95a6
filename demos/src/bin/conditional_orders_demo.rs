//! Parks a buy-stop above the market, then trades through its trigger
//! price and shows the engine promoting it to a live taker order.

use apex_clob::prelude::*;
use std::sync::Arc;

fn amt(s: &str) -> Amount {
    Amount::from_decimal_str(s).unwrap()
}

fn limit(user_id: Hash32, side: Side, price: Amount, qty: Amount, client_id: u64) -> Command {
    Command::Submit(SubmitRequest {
        client_id,
        user_id,
        symbol: "BTC/USD".into(),
        side,
        kind: OrderKind::Limit {
            limit_price: price,
            post_only: false,
        },
        qty,
        tif: TimeInForce::Gtc,
        deadline_ns: None,
    })
}

fn main() {
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
    let alice = Hash32::from_bytes(b"alice");
    let bob = Hash32::from_bytes(b"bob");
    let carol = Hash32::from_bytes(b"carol");
    for user in [alice, bob, carol] {
        ledger.mint(user, &usd, amt("10000"));
        ledger.mint(user, &btc, amt("10"));
    }

    let stop = Command::Submit(SubmitRequest {
        client_id: 1,
        user_id: carol,
        symbol: "BTC/USD".into(),
        side: Side::Buy,
        kind: OrderKind::Stop {
            stop_price: amt("101.00"),
        },
        qty: amt("1"),
        tif: TimeInForce::Gtc,
        deadline_ns: None,
    });
    engine.process(stop, 1);
    println!("pending triggers before the market moves: {}", engine.pending_trigger_count());

    engine.process(limit(bob, Side::Sell, amt("101.00"), amt("5"), 2), 2);
    let events = engine.process(limit(alice, Side::Buy, amt("101.00"), amt("1"), 3), 3);
    for event in &events {
        println!("{event:?}");
    }

    println!("pending triggers after the cross: {}", engine.pending_trigger_count());
}
