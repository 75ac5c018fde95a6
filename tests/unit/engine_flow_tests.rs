use apex_clob::prelude::*;
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
        protection_band_bps: 200,
    }
}

fn make_engine() -> (MatchingEngine, Arc<Ledger>) {
    let ledger = Arc::new(Ledger::new());
    let tier = RiskTier {
        max_position: amt("1000"),
        max_daily_loss: amt("100000"),
        max_order_size: amt("100"),
        max_leverage: 10,
    };
    let risk = Arc::new(RiskGate::new(tier, 1000, 1000.0));
    (MatchingEngine::new(symbol_config(), ledger.clone(), risk), ledger)
}

fn fund(ledger: &Ledger, user: Hash32, usd: &Asset, btc: &Asset) {
    ledger.mint(user, usd, amt("1000000"));
    ledger.mint(user, btc, amt("1000"));
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

#[test]
fn a_limit_order_that_crosses_produces_a_trade_and_settles_both_sides() {
    let (mut engine, ledger) = make_engine();
    let usd = Asset::new("USD");
    let btc = Asset::new("BTC");
    let maker = Hash32::from_bytes(b"maker");
    let taker = Hash32::from_bytes(b"taker");
    fund(&ledger, maker, &usd, &btc);
    fund(&ledger, taker, &usd, &btc);

    engine.process(limit(maker, Side::Sell, amt("50.00"), amt("2"), 1), 1);
    let events = engine.process(limit(taker, Side::Buy, amt("50.00"), amt("2"), 2), 2);

    assert!(events.iter().any(|e| matches!(e.kind, EventKind::Trade(_))));
    assert_eq!(ledger.balance(taker, &btc).available, amt("1002"));
    assert_eq!(ledger.balance(maker, &usd).available, amt("1000100"));
}

#[test]
fn an_order_too_large_for_the_risk_tier_is_rejected_before_it_reaches_the_book() {
    let (mut engine, ledger) = make_engine();
    let usd = Asset::new("USD");
    let btc = Asset::new("BTC");
    let trader = Hash32::from_bytes(b"trader");
    fund(&ledger, trader, &usd, &btc);

    // max_order_size in the tier above is 100; this qty exceeds it.
    let events = engine.process(limit(trader, Side::Buy, amt("10.00"), amt("500"), 1), 1);

    assert!(events.iter().any(|e| matches!(e.kind, EventKind::Rejected { .. })));
    assert_eq!(ledger.balance(trader, &usd).locked, Amount::ZERO);
}

#[test]
fn cancelling_a_resting_order_releases_its_full_reservation() {
    let (mut engine, ledger) = make_engine();
    let usd = Asset::new("USD");
    let btc = Asset::new("BTC");
    let trader = Hash32::from_bytes(b"trader");
    fund(&ledger, trader, &usd, &btc);

    let accepted = engine.process(limit(trader, Side::Buy, amt("10.00"), amt("3"), 1), 1);
    let order_id = match &accepted[0].kind {
        EventKind::Accepted { order_id } => *order_id,
        other => panic!("expected Accepted, got {other:?}"),
    };
    assert_eq!(ledger.balance(trader, &usd).locked, amt("30"));

    let cancelled = engine.process(
        Command::Cancel {
            user_id: trader,
            order_id,
        },
        2,
    );
    assert!(matches!(cancelled[0].kind, EventKind::Cancelled { .. }));
    assert_eq!(ledger.balance(trader, &usd).locked, Amount::ZERO);
    assert_eq!(ledger.balance(trader, &usd).available, amt("1000000"));
}

#[test]
fn shrinking_a_resting_order_through_modify_preserves_its_queue_priority() {
    let (mut engine, ledger) = make_engine();
    let usd = Asset::new("USD");
    let btc = Asset::new("BTC");
    let trader = Hash32::from_bytes(b"trader");
    fund(&ledger, trader, &usd, &btc);

    let accepted = engine.process(limit(trader, Side::Buy, amt("10.00"), amt("5"), 1), 1);
    let order_id = match &accepted[0].kind {
        EventKind::Accepted { order_id } => *order_id,
        other => panic!("expected Accepted, got {other:?}"),
    };
    let original_ts = engine.book().get_order(order_id).unwrap().accepted_ts;

    let modified = engine.process(
        Command::Modify {
            user_id: trader,
            order_id,
            new_qty: Some(amt("2")),
            new_price: None,
        },
        2,
    );
    assert!(matches!(modified[0].kind, EventKind::Resting { .. }));
    let shrunk_ts = engine.book().get_order(order_id).unwrap().accepted_ts;
    assert_eq!(shrunk_ts, original_ts);
    assert_eq!(ledger.balance(trader, &usd).locked, amt("20"));
}
