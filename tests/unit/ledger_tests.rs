use apex_clob::prelude::*;

fn amt(s: &str) -> Amount {
    Amount::from_decimal_str(s).unwrap()
}

#[test]
fn mint_then_reserve_moves_funds_between_buckets() {
    let ledger = Ledger::new();
    let user = Hash32::from_bytes(b"alice");
    let usd = Asset::new("USD");

    ledger.mint(user, &usd, amt("1000"));
    ledger.reserve(user, &usd, amt("400")).unwrap();

    let balance = ledger.balance(user, &usd);
    assert_eq!(balance.available, amt("600"));
    assert_eq!(balance.locked, amt("400"));
}

#[test]
fn reserve_beyond_available_is_rejected() {
    let ledger = Ledger::new();
    let user = Hash32::from_bytes(b"alice");
    let usd = Asset::new("USD");
    ledger.mint(user, &usd, amt("100"));

    let err = ledger.reserve(user, &usd, amt("101")).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientAvailable { .. }));
}

#[test]
fn settle_trade_moves_base_and_quote_atomically_with_fees() {
    let ledger = Ledger::new();
    let usd = Asset::new("USD");
    let btc = Asset::new("BTC");
    let buyer = Hash32::from_bytes(b"buyer");
    let seller = Hash32::from_bytes(b"seller");

    ledger.mint(buyer, &usd, amt("10000"));
    ledger.mint(seller, &btc, amt("10"));
    ledger.reserve(buyer, &usd, amt("5000")).unwrap();
    ledger.reserve(seller, &btc, amt("5")).unwrap();

    // Seller is the resting maker, buyer is the taker lifting the offer.
    ledger
        .settle_trade(
            buyer,
            seller,
            &btc,
            &usd,
            amt("1"),
            amt("100"),
            false,
            amt("0"),
            amt("0.5"),
        )
        .unwrap();

    assert_eq!(ledger.balance(buyer, &btc).available, amt("1"));
    assert_eq!(ledger.balance(buyer, &usd).locked, amt("4899.5"));
    assert_eq!(ledger.balance(seller, &usd).available, amt("100"));
    assert_eq!(ledger.balance(seller, &btc).locked, amt("4"));
}

#[test]
fn release_beyond_locked_is_an_invariant_violation() {
    let ledger = Ledger::new();
    let user = Hash32::from_bytes(b"alice");
    let usd = Asset::new("USD");
    ledger.mint(user, &usd, amt("100"));

    let err = ledger.release(user, &usd, amt("1")).unwrap_err();
    assert!(matches!(err, LedgerError::InvariantViolation { .. }));
}
