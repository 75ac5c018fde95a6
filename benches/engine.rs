//! Throughput benchmarks for the matching engine's hot command path.

use apex_clob::prelude::*;
use criterion::Criterion;
use std::hint::black_box;
use std::sync::Arc;

fn amt(s: &str) -> Amount {
    Amount::from_decimal_str(s).unwrap()
}

fn symbol_config() -> SymbolConfig {
    SymbolConfig {
        symbol: Symbol::new("BTC", "USD"),
        tick_size: amt("0.01"),
        lot_size: amt("0.00000001"),
        min_notional: Amount::ZERO,
        max_order_qty: amt("1000000"),
        protection_band_bps: 500,
    }
}

fn make_engine() -> (MatchingEngine, Arc<Ledger>) {
    let ledger = Arc::new(Ledger::new());
    let tier = RiskTier {
        max_position: amt("1000000"),
        max_daily_loss: amt("100000000"),
        max_order_size: amt("100000"),
        max_leverage: 50,
    };
    let risk = Arc::new(RiskGate::new(tier, 1_000_000, 1_000_000.0));
    (MatchingEngine::new(symbol_config(), ledger.clone(), risk), ledger)
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

pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    group.bench_function("resting_limit_inserts", |b| {
        b.iter(|| {
            let (mut engine, ledger) = make_engine();
            let usd = Asset::new("USD");
            let btc = Asset::new("BTC");
            let trader = Hash32::from_bytes(b"bench-resting");
            ledger.mint(trader, &usd, amt("100000000"));
            ledger.mint(trader, &btc, amt("100000000"));
            for i in 0..1_000u64 {
                let price = amt("100.00").checked_add(Amount::from_integer(i as i64 % 50)).unwrap();
                black_box(engine.process(limit(trader, Side::Buy, price, amt("1"), i), i + 1));
            }
        })
    });

    group.bench_function("crossing_fills", |b| {
        b.iter(|| {
            let (mut engine, ledger) = make_engine();
            let usd = Asset::new("USD");
            let btc = Asset::new("BTC");
            let maker = Hash32::from_bytes(b"bench-maker");
            let taker = Hash32::from_bytes(b"bench-taker");
            for user in [maker, taker] {
                ledger.mint(user, &usd, amt("100000000"));
                ledger.mint(user, &btc, amt("100000000"));
            }
            for i in 0..1_000u64 {
                engine.process(limit(maker, Side::Sell, amt("100.00"), amt("1"), i * 2), i * 2 + 1);
                black_box(engine.process(
                    limit(taker, Side::Buy, amt("100.00"), amt("1"), i * 2 + 1),
                    i * 2 + 2,
                ));
            }
        })
    });

    group.finish();
}
