//! The per-symbol matching engine: command intake, reservation, matching,
//! settlement, and the conditional-order/OCO/iceberg orchestration spec.md
//! §4.4 assigns to it.
//!
//! One `MatchingEngine` owns exactly one `OrderBook` and one
//! `TriggerRegistry` for its symbol (spec.md §5 "one matching engine per
//! symbol, each the sole mutator of its book"); the `Ledger` and `RiskGate`
//! are shared across every symbol's engine behind `Arc` (spec.md §5 "The
//! Ledger is shared across symbols").

pub mod commands;
pub mod error;
pub mod events;

pub use commands::{Command, SubmitRequest};
pub use error::EngineError;
pub use events::{EventEnvelope, EventKind};

use crate::ledger::{Ledger, LedgerError};
use crate::orderbook::{FeeSchedule, MatchOutcome, OrderBook, STPMode};
use crate::risk::RiskGate;
use crate::triggers::{Promotion, TriggerRegistry};
use crate::types::{
    Amount, Asset, Hash32, IdGenerator, Order, OrderId, OrderKind, OrderState, Side, SymbolConfig,
    TriggerExecStyle, SCALE,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The reference price an `OrderKind`'s own fields carry, used both to size
/// a reservation at acceptance and to recover a notional figure when
/// releasing one later. `None` only for `Market` (and an `OcoLeg` wrapping
/// one), which carries no price of its own.
fn static_ref_price(kind: &OrderKind) -> Option<Amount> {
    match kind {
        OrderKind::Limit { limit_price, .. } => Some(*limit_price),
        OrderKind::StopLimit { limit_price, .. } => Some(*limit_price),
        OrderKind::Iceberg { limit_price, .. } => Some(*limit_price),
        OrderKind::TakeProfit {
            limit_price,
            trigger_price,
            ..
        } => Some(limit_price.unwrap_or(*trigger_price)),
        OrderKind::Stop { stop_price } => Some(*stop_price),
        OrderKind::TrailingStop { high_water_mark, .. } => Some(*high_water_mark),
        OrderKind::Market => None,
        OrderKind::OcoLeg { inner, .. } => static_ref_price(inner),
    }
}

/// The quote-equivalent notional still reserved against an order's
/// remaining quantity. Accurate for anything that can come to rest on the
/// book or sit in the trigger registry (every kind except `Market`, which
/// never does either).
fn remaining_notional(order: &Order) -> Amount {
    static_ref_price(&order.kind)
        .and_then(|p| p.checked_mul_qty(order.remaining_qty()))
        .unwrap_or(Amount::ZERO)
}

/// One symbol's matching engine: the `OrderBook`, its `TriggerRegistry`,
/// shared `Ledger`/`RiskGate` handles, and the per-symbol id/timestamp/event
/// sequence counters spec.md §5 keeps off the shared-state hot path.
pub struct MatchingEngine {
    book: OrderBook,
    triggers: TriggerRegistry,
    ledger: Arc<Ledger>,
    risk: Arc<RiskGate>,
    ids: IdGenerator,
    base_asset: Asset,
    quote_asset: Asset,
    last_ts: u64,
    next_seq: u64,
    /// Set once a `LedgerError::is_fatal` breach is observed; from then on
    /// every command is rejected without touching book/ledger/risk state
    /// (spec.md §7 "the owning symbol halts").
    halted: Option<String>,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(config: SymbolConfig, ledger: Arc<Ledger>, risk: Arc<RiskGate>) -> Self {
        let base_asset = config.symbol.base.clone();
        let quote_asset = config.symbol.quote.clone();
        Self {
            book: OrderBook::new(config),
            triggers: TriggerRegistry::new(),
            ledger,
            risk,
            ids: IdGenerator::new(),
            base_asset,
            quote_asset,
            last_ts: 0,
            next_seq: 0,
            halted: None,
        }
    }

    #[must_use]
    pub fn with_stp_mode(mut self, mode: STPMode) -> Self {
        self.book = self.book.with_stp_mode(mode);
        self
    }

    #[must_use]
    pub fn with_fee_schedule(mut self, schedule: FeeSchedule) -> Self {
        self.book = self.book.with_fee_schedule(schedule);
        self
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        self.book.symbol()
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    #[must_use]
    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[must_use]
    pub fn pending_trigger_count(&self) -> usize {
        self.triggers.pending_count()
    }

    fn emit(&mut self, now_ns: u64, kind: EventKind) -> EventEnvelope {
        let seq = self.next_seq;
        self.next_seq += 1;
        EventEnvelope {
            symbol: self.book.symbol().to_string(),
            seq,
            ts_ns: now_ns,
            kind,
        }
    }

    /// Assign the next `accepted_ts`, strictly increasing even when several
    /// commands share one wall-clock `now_ns` (spec.md §3: "the sole time
    /// priority key").
    fn assign_ts(&mut self, now_ns: u64) -> u64 {
        let ts = now_ns.max(self.last_ts + 1);
        self.last_ts = ts;
        ts
    }

    fn note_fatal(&mut self, err: &EngineError) {
        if err.is_fatal() && self.halted.is_none() {
            self.halted = Some(err.to_string());
        }
    }

    /// Dispatch one command, returning every event it produced in order.
    pub fn process(&mut self, command: Command, now_ns: u64) -> Vec<EventEnvelope> {
        match command {
            Command::Submit(req) => self.handle_submit(req, now_ns),
            Command::Cancel { user_id, order_id } => self.handle_cancel(user_id, order_id, now_ns),
            Command::Modify {
                user_id,
                order_id,
                new_qty,
                new_price,
            } => self.handle_modify(user_id, order_id, new_qty, new_price, now_ns),
            Command::Tick { now_ns: tick_ns } => self.handle_tick(tick_ns),
        }
    }

    fn reject(
        &mut self,
        now_ns: u64,
        client_id: u64,
        order_id: Option<OrderId>,
        reason: impl ToString,
    ) -> Vec<EventEnvelope> {
        vec![self.emit(
            now_ns,
            EventKind::Rejected {
                client_id,
                order_id,
                reason: reason.to_string(),
            },
        )]
    }

    fn halted_rejection(&mut self, now_ns: u64, client_id: u64, order_id: Option<OrderId>) -> Vec<EventEnvelope> {
        let reason = self.halted.clone().unwrap_or_default();
        self.reject(now_ns, client_id, order_id, format!("symbol halted: {reason}"))
    }

    // ---- reservation sizing -------------------------------------------------

    /// Best-opposite-side price to anchor a market order's protection band
    /// against, falling back to the last trade when one side is empty.
    fn reference_price(&self, side: Side) -> Result<Amount, EngineError> {
        let px = match side {
            Side::Buy => self.book.best_ask().or_else(|| self.book.last_trade_price()),
            Side::Sell => self.book.best_bid().or_else(|| self.book.last_trade_price()),
        };
        px.ok_or(EngineError::Book(crate::orderbook::OrderBookError::InsufficientLiquidity {
            side,
            requested: Amount::ZERO,
            available: Amount::ZERO,
        }))
    }

    /// A market order's worst acceptable fill price: the reference price
    /// inflated (buy) or deflated (sell) by `protection_band_bps` (spec.md
    /// §4.1 "protection band").
    fn protection_band_price(&self, side: Side) -> Result<Amount, EngineError> {
        let base = self.reference_price(side)?;
        let bps = self.book.config().protection_band_bps;
        let factor = Amount::from_raw(i128::from(bps) * (SCALE / 10_000));
        let delta = base
            .checked_mul_qty(factor)
            .ok_or(EngineError::Ledger(LedgerError::Overflow))?;
        Ok(match side {
            Side::Buy => base + delta,
            Side::Sell => {
                let lowered = base.checked_sub(delta).unwrap_or(Amount::ZERO);
                if lowered.is_negative() {
                    Amount::ZERO
                } else {
                    lowered
                }
            }
        })
    }

    /// `(reserved_base, reserved_quote, notional, ref_price)` for a would-be
    /// order (spec.md §4.2 "reservation rules by kind"). `notional` is
    /// always the quote-equivalent value used for the risk gate's
    /// order-size/position checks, regardless of side.
    fn reservation_for(&self, req: &SubmitRequest) -> Result<(Amount, Amount, Amount, Amount), EngineError> {
        let ref_price = match static_ref_price(&req.kind) {
            Some(p) => p,
            None => self.protection_band_price(req.side)?,
        };
        let notional = ref_price
            .checked_mul_qty(req.qty)
            .ok_or(EngineError::Ledger(LedgerError::Overflow))?;
        let (reserved_base, reserved_quote) = match req.side {
            Side::Buy => (Amount::ZERO, notional),
            Side::Sell => (req.qty, Amount::ZERO),
        };
        Ok((reserved_base, reserved_quote, notional, ref_price))
    }

    fn reserve_both(&self, user_id: Hash32, base: Amount, quote: Amount) -> Result<(), EngineError> {
        if !quote.is_zero() {
            self.ledger.reserve(user_id, &self.quote_asset, quote)?;
        }
        if !base.is_zero() {
            if let Err(e) = self.ledger.reserve(user_id, &self.base_asset, base) {
                if !quote.is_zero() {
                    let _ = self.ledger.release(user_id, &self.quote_asset, quote);
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn release_reservation(&mut self, user_id: Hash32, base: Amount, quote: Amount) {
        if !quote.is_zero() {
            if let Err(e) = self.ledger.release(user_id, &self.quote_asset, quote) {
                self.note_fatal(&e.into());
            }
        }
        if !base.is_zero() {
            if let Err(e) = self.ledger.release(user_id, &self.base_asset, base) {
                self.note_fatal(&e.into());
            }
        }
    }

    // ---- submit --------------------------------------------------------------

    fn handle_submit(&mut self, req: SubmitRequest, now_ns: u64) -> Vec<EventEnvelope> {
        if self.halted.is_some() {
            return self.halted_rejection(now_ns, req.client_id, None);
        }
        if req.symbol != self.book.symbol() {
            let err = EngineError::InvalidSymbol { symbol: req.symbol };
            return self.reject(now_ns, req.client_id, None, err);
        }
        if let Some(deadline) = req.deadline_ns {
            if now_ns > deadline {
                return self.reject(now_ns, req.client_id, None, EngineError::DeadlineExceeded);
            }
        }

        if let Err(e) = self.book.validate_order(req.kind.limit_price(), req.qty) {
            return self.reject(now_ns, req.client_id, None, e);
        }

        let (reserved_base, reserved_quote, notional, ref_price) = match self.reservation_for(&req) {
            Ok(v) => v,
            Err(e) => return self.reject(now_ns, req.client_id, None, e),
        };

        if let Err(e) = self
            .risk
            .check_submit(req.user_id, &req.symbol, req.side, req.qty, notional, now_ns)
        {
            return self.reject(now_ns, req.client_id, None, e);
        }

        if let Err(e) = self.reserve_both(req.user_id, reserved_base, reserved_quote) {
            self.risk.release_open_notional(req.user_id, notional, now_ns);
            return self.reject(now_ns, req.client_id, None, e);
        }

        let order_id = self.ids.next_order_id();
        let accepted_ts = self.assign_ts(now_ns);
        let starts_pending = req.kind.starts_pending_trigger();
        let is_iceberg = matches!(req.kind.dispatch_kind(), OrderKind::Iceberg { .. });

        let order = Order {
            id: order_id,
            user_id: req.user_id,
            symbol_key: req.symbol.clone(),
            side: req.side,
            kind: req.kind.clone(),
            qty: req.qty,
            filled_qty: Amount::ZERO,
            tif: req.tif,
            state: if starts_pending {
                OrderState::PendingTrigger
            } else {
                OrderState::New
            },
            accepted_ts,
            reserved_base,
            reserved_quote,
            oco_sibling_id: None,
        };

        let mut events = vec![self.emit(now_ns, EventKind::Accepted { order_id })];

        if let OrderKind::OcoLeg { sibling_id, .. } = &req.kind {
            let sibling_id = *sibling_id;
            if !self.book.tag_oco_sibling(sibling_id, order_id) {
                self.triggers.tag_oco_sibling(sibling_id, order_id);
            }
            self.triggers.register_oco(order_id, sibling_id);
        }

        if starts_pending {
            self.triggers.register(order);
            return events;
        }

        if is_iceberg {
            let OrderKind::Iceberg {
                limit_price,
                display_qty,
            } = req.kind.dispatch_kind().clone()
            else {
                unreachable!("is_iceberg only true for OrderKind::Iceberg");
            };
            self.triggers.register_iceberg(order_id, limit_price, display_qty, req.qty);
            self.submit_iceberg_slice(order, req.client_id, limit_price, display_qty, now_ns, &mut events);
            return events;
        }

        self.submit_to_book(order, req.client_id, ref_price, now_ns, &mut events);
        events
    }

    /// Submit one order (or one iceberg slice) into the book and apply the
    /// resulting TIF outcome. Returns the order's final book-side state,
    /// `None` if `book.submit` itself rejected it outright (post-only
    /// crossed, FOK unfillable — nothing was mutated).
    fn submit_to_book(
        &mut self,
        order: Order,
        client_id: u64,
        ref_price: Amount,
        now_ns: u64,
        events: &mut Vec<EventEnvelope>,
    ) -> Option<Order> {
        let order_id = order.id;
        let user_id = order.user_id;
        let reserved_base = order.reserved_base;
        let reserved_quote = order.reserved_quote;
        let qty = order.qty;
        let match_limit = order.kind.limit_price().or(Some(ref_price));

        match self.book.submit(order, match_limit, now_ns) {
            Ok(outcome) => {
                self.process_match_outcome(&outcome.match_outcome, now_ns, events);
                if self.halted.is_some() {
                    return self.book.get_order(order_id);
                }
                let final_order = self.book.get_order(order_id);
                if outcome.rested {
                    if let Some(o) = &final_order {
                        if let Some(price) = o.kind.limit_price() {
                            events.push(self.emit(now_ns, EventKind::Resting { order_id, price }));
                        }
                    }
                } else if let Some(o) = &final_order {
                    if o.state == OrderState::Cancelled {
                        let leftover = ref_price.checked_mul_qty(o.remaining_qty()).unwrap_or(Amount::ZERO);
                        self.release_reservation(user_id, o.reserved_base, o.reserved_quote);
                        self.risk.release_open_notional(user_id, leftover, now_ns);
                        events.push(self.emit(
                            now_ns,
                            EventKind::Cancelled {
                                order_id,
                                reason: "time_in_force".into(),
                            },
                        ));
                    }
                }
                final_order
            }
            Err(e) => {
                self.release_reservation(user_id, reserved_base, reserved_quote);
                let notional = ref_price.checked_mul_qty(qty).unwrap_or(Amount::ZERO);
                self.risk.release_open_notional(user_id, notional, now_ns);
                events.push(self.emit(
                    now_ns,
                    EventKind::Rejected {
                        client_id,
                        order_id: Some(order_id),
                        reason: e.to_string(),
                    },
                ));
                None
            }
        }
    }

    /// Re-issue an iceberg's displayed slice each time it fully fills, until
    /// the hidden total is exhausted (spec.md §4.3 point 4). The external
    /// `OrderId` stays constant across slices; only `accepted_ts` advances.
    fn submit_iceberg_slice(
        &mut self,
        mut order: Order,
        client_id: u64,
        limit_price: Amount,
        display_qty: Amount,
        now_ns: u64,
        events: &mut Vec<EventEnvelope>,
    ) {
        let order_id = order.id;
        let user_id = order.user_id;
        let side = order.side;
        let symbol_key = order.symbol_key.clone();
        let tif = order.tif;
        let oco_sibling_id = order.oco_sibling_id;

        loop {
            let Some(final_order) = self.submit_to_book(order, client_id, limit_price, now_ns, events) else {
                self.triggers.forget_iceberg(order_id);
                return;
            };
            if self.halted.is_some() {
                return;
            }
            self.triggers.record_iceberg_fill(order_id, final_order.filled_qty);

            if final_order.state != OrderState::Filled {
                return;
            }

            match self.triggers.next_iceberg_slice(order_id) {
                Some(next_qty) => {
                    let fresh_ts = self.assign_ts(now_ns);
                    order = Order {
                        id: order_id,
                        user_id,
                        symbol_key: symbol_key.clone(),
                        side,
                        kind: OrderKind::Iceberg { limit_price, display_qty },
                        qty: next_qty,
                        filled_qty: Amount::ZERO,
                        tif,
                        state: OrderState::New,
                        accepted_ts: fresh_ts,
                        reserved_base: Amount::ZERO,
                        reserved_quote: Amount::ZERO,
                        oco_sibling_id,
                    };
                }
                None => {
                    self.triggers.forget_iceberg(order_id);
                    return;
                }
            }
        }
    }

    /// Settle every trade in `outcome`, decrement both legs' reservations in
    /// lockstep, emit `Trade`/`PartiallyFilled`/`Filled`, release cancelled
    /// STP makers, and let any newly-crossed conditional orders fire.
    fn process_match_outcome(&mut self, outcome: &MatchOutcome, now_ns: u64, events: &mut Vec<EventEnvelope>) {
        let mut touched: BTreeSet<OrderId> = BTreeSet::new();

        for trade in &outcome.trades {
            let maker_is_buyer = trade.maker_side == Side::Buy;
            let (buyer_id, seller_id) = if maker_is_buyer {
                (trade.maker_order_id, trade.taker_order_id)
            } else {
                (trade.taker_order_id, trade.maker_order_id)
            };
            let (Some(buyer_order), Some(seller_order)) =
                (self.book.get_order(buyer_id), self.book.get_order(seller_id))
            else {
                continue;
            };
            let notional = trade.price.checked_mul_qty(trade.qty).unwrap_or(Amount::ZERO);

            match self.ledger.settle_trade(
                buyer_order.user_id,
                seller_order.user_id,
                &self.base_asset,
                &self.quote_asset,
                trade.qty,
                trade.price,
                maker_is_buyer,
                trade.maker_fee,
                trade.taker_fee,
            ) {
                Ok(()) => {}
                Err(e) => {
                    let engine_err: EngineError = e.into();
                    self.note_fatal(&engine_err);
                    events.push(self.emit(
                        now_ns,
                        EventKind::HaltedSymbol {
                            reason: engine_err.to_string(),
                        },
                    ));
                    return;
                }
            }

            self.book.decrement_reservation(buyer_id, Amount::ZERO, notional);
            self.book.decrement_reservation(seller_id, trade.qty, Amount::ZERO);
            self.risk
                .record_fill(buyer_order.user_id, self.book.symbol(), Side::Buy, trade.qty, now_ns);
            self.risk
                .record_fill(seller_order.user_id, self.book.symbol(), Side::Sell, trade.qty, now_ns);
            self.risk.release_open_notional(buyer_order.user_id, notional, now_ns);
            self.risk.release_open_notional(seller_order.user_id, notional, now_ns);

            events.push(self.emit(now_ns, EventKind::Trade(trade.clone())));
            touched.insert(buyer_id);
            touched.insert(seller_id);
        }

        for id in touched {
            let Some(order) = self.book.get_order(id) else { continue };
            match order.state {
                OrderState::Filled => {
                    events.push(self.emit(now_ns, EventKind::Filled { order_id: id }));
                    if let Some(sibling_id) = order.oco_sibling_id {
                        self.cascade_oco_cancel(Some(sibling_id), now_ns, events);
                    }
                }
                OrderState::PartiallyFilled => {
                    events.push(self.emit(
                        now_ns,
                        EventKind::PartiallyFilled {
                            order_id: id,
                            filled_qty: order.filled_qty,
                            remaining_qty: order.remaining_qty(),
                        },
                    ));
                }
                _ => {}
            }
        }

        for maker_id in &outcome.stp_cancelled_makers {
            if let Some(order) = self.book.get_order(*maker_id) {
                self.release_reservation(order.user_id, order.reserved_base, order.reserved_quote);
                self.risk
                    .release_open_notional(order.user_id, remaining_notional(&order), now_ns);
                events.push(self.emit(
                    now_ns,
                    EventKind::Cancelled {
                        order_id: *maker_id,
                        reason: "self_trade_prevented".into(),
                    },
                ));
                if let Some(sibling_id) = order.oco_sibling_id {
                    self.cascade_oco_cancel(Some(sibling_id), now_ns, events);
                }
            }
        }

        if let Some(last_price) = self.book.last_trade_price() {
            let promotions = self.triggers.poll(last_price);
            for promo in promotions {
                self.fire_promotion(promo, now_ns, events);
                if self.halted.is_some() {
                    return;
                }
            }
        }
    }

    /// Cancel an OCO sibling wherever it currently lives — resting on the
    /// book or still pending in the trigger registry (spec.md §4.3 point
    /// 5). A no-op if the sibling already left both (it fired/cancelled
    /// first and already cascaded).
    fn cascade_oco_cancel(&mut self, sibling_id: Option<OrderId>, now_ns: u64, events: &mut Vec<EventEnvelope>) {
        let Some(sibling_id) = sibling_id else { return };
        let cancelled = if let Ok(order) = self.book.cancel(sibling_id) {
            Some(order)
        } else {
            self.triggers.remove(sibling_id)
        };
        let Some(order) = cancelled else { return };
        self.release_reservation(order.user_id, order.reserved_base, order.reserved_quote);
        self.risk
            .release_open_notional(order.user_id, remaining_notional(&order), now_ns);
        events.push(self.emit(
            now_ns,
            EventKind::Cancelled {
                order_id: sibling_id,
                reason: "oco_sibling".into(),
            },
        ));
    }

    /// Fire a conditional order: re-check risk (spec.md §4.4 "Trigger
    /// promotion that fails risk re-check at fire time" is cancelled as a
    /// stale trigger rather than submitted), rewrite its kind to the
    /// promoted exec style, and submit it as a fresh taker.
    fn fire_promotion(&mut self, promo: Promotion, now_ns: u64, events: &mut Vec<EventEnvelope>) {
        let mut order = promo.order;
        let order_id = order.id;
        events.push(self.emit(now_ns, EventKind::Triggered { order_id }));

        let fallback_price = self.book.last_trade_price().unwrap_or(Amount::ZERO);
        let ref_price = static_ref_price(&order.kind).unwrap_or(fallback_price);
        let notional = ref_price.checked_mul_qty(order.remaining_qty()).unwrap_or(Amount::ZERO);

        if let Err(e) = self
            .risk
            .check_submit(order.user_id, self.book.symbol(), order.side, order.remaining_qty(), notional, now_ns)
        {
            self.release_reservation(order.user_id, order.reserved_base, order.reserved_quote);
            events.push(self.emit(
                now_ns,
                EventKind::Cancelled {
                    order_id,
                    reason: format!("stale_trigger: {e}"),
                },
            ));
            if let Some(sibling_id) = order.oco_sibling_id {
                self.cascade_oco_cancel(Some(sibling_id), now_ns, events);
            }
            return;
        }
        // The re-check above debited open_notional a second time; release
        // that extra debit immediately since this is only a re-validation,
        // not a second reservation against a second order.
        self.risk.release_open_notional(order.user_id, notional, now_ns);

        order.kind = match promo.exec_style {
            TriggerExecStyle::Market => OrderKind::Market,
            TriggerExecStyle::Limit => OrderKind::Limit {
                limit_price: promo.exec_price.unwrap_or(ref_price),
                post_only: false,
            },
        };
        order.state = OrderState::New;

        let match_ref_price = match &order.kind {
            OrderKind::Market => self.protection_band_price(order.side).unwrap_or(ref_price),
            other => other.limit_price().unwrap_or(ref_price),
        };
        self.submit_to_book(order, 0, match_ref_price, now_ns, events);
    }

    // ---- cancel ----------------------------------------------------------

    fn handle_cancel(&mut self, user_id: Hash32, order_id: OrderId, now_ns: u64) -> Vec<EventEnvelope> {
        if self.halted.is_some() {
            return self.halted_rejection(now_ns, 0, Some(order_id));
        }

        if let Some(order) = self.book.get_order(order_id) {
            if order.state.is_terminal() {
                return self.reject(now_ns, 0, Some(order_id), EngineError::UnknownOrder(order_id));
            }
            if order.user_id != user_id {
                return self.reject(now_ns, 0, Some(order_id), EngineError::NotOwner(order_id));
            }
            return self.cancel_resting_order(order_id, now_ns);
        }

        if let Some(order) = self.triggers.remove(order_id) {
            if order.user_id != user_id {
                self.triggers.register(order);
                return self.reject(now_ns, 0, Some(order_id), EngineError::NotOwner(order_id));
            }
            self.release_reservation(order.user_id, order.reserved_base, order.reserved_quote);
            self.risk
                .release_open_notional(order.user_id, remaining_notional(&order), now_ns);
            let mut events = vec![self.emit(
                now_ns,
                EventKind::Cancelled {
                    order_id,
                    reason: "user_requested".into(),
                },
            )];
            self.cascade_oco_cancel(order.oco_sibling_id, now_ns, &mut events);
            return events;
        }

        self.reject(now_ns, 0, Some(order_id), EngineError::UnknownOrder(order_id))
    }

    fn cancel_resting_order(&mut self, order_id: OrderId, now_ns: u64) -> Vec<EventEnvelope> {
        let Ok(order) = self.book.cancel(order_id) else {
            return self.reject(now_ns, 0, Some(order_id), EngineError::UnknownOrder(order_id));
        };

        if let Some(remaining_hidden) = self.triggers.iceberg_remaining(order_id) {
            let limit_price = self.triggers.iceberg_limit_price(order_id).unwrap_or(Amount::ZERO);
            let notional = limit_price.checked_mul_qty(remaining_hidden).unwrap_or(Amount::ZERO);
            match order.side {
                Side::Buy => self.release_reservation(order.user_id, Amount::ZERO, notional),
                Side::Sell => self.release_reservation(order.user_id, remaining_hidden, Amount::ZERO),
            }
            self.risk.release_open_notional(order.user_id, notional, now_ns);
            self.triggers.forget_iceberg(order_id);
        } else {
            self.release_reservation(order.user_id, order.reserved_base, order.reserved_quote);
            self.risk
                .release_open_notional(order.user_id, remaining_notional(&order), now_ns);
        }

        let mut events = vec![self.emit(
            now_ns,
            EventKind::Cancelled {
                order_id,
                reason: "user_requested".into(),
            },
        )];
        self.cascade_oco_cancel(order.oco_sibling_id, now_ns, &mut events);
        events
    }

    // ---- modify ------------------------------------------------------------

    /// Per spec.md §8's round-trip law: a `Modify` that only shrinks
    /// quantity at an unchanged price preserves `accepted_ts` (and so time
    /// priority); every other `Modify` is observably cancel-then-submit.
    fn handle_modify(
        &mut self,
        user_id: Hash32,
        order_id: OrderId,
        new_qty: Option<Amount>,
        new_price: Option<Amount>,
        now_ns: u64,
    ) -> Vec<EventEnvelope> {
        if self.halted.is_some() {
            return self.halted_rejection(now_ns, 0, Some(order_id));
        }
        let Some(existing) = self.book.get_order(order_id).filter(|o| !o.state.is_terminal()) else {
            return self.reject(now_ns, 0, Some(order_id), EngineError::UnknownOrder(order_id));
        };
        if existing.user_id != user_id {
            return self.reject(now_ns, 0, Some(order_id), EngineError::NotOwner(order_id));
        }

        let shrink_only = new_price.is_none()
            && new_qty.is_some_and(|q| q < existing.qty && q >= existing.filled_qty);

        if shrink_only {
            let new_qty = new_qty.expect("shrink_only implies Some");
            let reduce_by = existing.qty.checked_sub(new_qty).unwrap_or(Amount::ZERO);
            if self.book.reduce_resting_quantity(order_id, reduce_by).is_err() {
                return self.reject(now_ns, 0, Some(order_id), EngineError::UnknownOrder(order_id));
            }
            let ref_price = existing.kind.limit_price().unwrap_or(Amount::ZERO);
            let freed_notional = ref_price.checked_mul_qty(reduce_by).unwrap_or(Amount::ZERO);
            match existing.side {
                Side::Buy => {
                    self.release_reservation(existing.user_id, Amount::ZERO, freed_notional);
                    self.book.decrement_reservation(order_id, Amount::ZERO, freed_notional);
                }
                Side::Sell => {
                    self.release_reservation(existing.user_id, reduce_by, Amount::ZERO);
                    self.book.decrement_reservation(order_id, reduce_by, Amount::ZERO);
                }
            }
            self.risk.release_open_notional(existing.user_id, freed_notional, now_ns);

            let mut events = Vec::new();
            if let Some(price) = existing.kind.limit_price() {
                events.push(self.emit(now_ns, EventKind::Resting { order_id, price }));
            }
            return events;
        }

        let mut events = self.handle_cancel(user_id, order_id, now_ns);
        if events.iter().any(|e| matches!(e.kind, EventKind::Rejected { .. })) {
            return events;
        }

        let kind = match (new_price, existing.kind.clone()) {
            (Some(p), OrderKind::Limit { post_only, .. }) => OrderKind::Limit { limit_price: p, post_only },
            (Some(p), OrderKind::StopLimit { stop_price, .. }) => OrderKind::StopLimit {
                stop_price,
                limit_price: p,
            },
            (_, k) => k,
        };
        let req = SubmitRequest {
            client_id: 0,
            user_id,
            symbol: existing.symbol_key.clone(),
            side: existing.side,
            kind,
            qty: new_qty.unwrap_or(existing.remaining_qty()),
            tif: existing.tif,
            deadline_ns: None,
        };
        events.extend(self.handle_submit(req, now_ns));
        events
    }

    // ---- tick --------------------------------------------------------------

    /// Session-boundary maintenance: expires resting `DAY` orders and rolls
    /// over every user's daily P&L accumulator (spec.md §4.4, §6 `session`).
    fn handle_tick(&mut self, now_ns: u64) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        if self.halted.is_some() {
            return events;
        }
        for order in self.book.expire_day_orders() {
            self.release_reservation(order.user_id, order.reserved_base, order.reserved_quote);
            self.risk
                .release_open_notional(order.user_id, remaining_notional(&order), now_ns);
            events.push(self.emit(now_ns, EventKind::Expired { order_id: order.id }));
            self.cascade_oco_cancel(order.oco_sibling_id, now_ns, &mut events);
        }
        self.risk.reset_all_daily_pnl();
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskTier;
    use crate::types::{Symbol, SymbolConfig, TimeInForce};

    fn amt(s: &str) -> Amount {
        Amount::from_decimal_str(s).unwrap()
    }

    fn config() -> SymbolConfig {
        SymbolConfig {
            symbol: Symbol::new("BTC", "USD"),
            tick_size: amt("0.01"),
            lot_size: amt("0.00000001"),
            min_notional: Amount::ZERO,
            max_order_qty: amt("1000000"),
            protection_band_bps: 200,
        }
    }

    fn tier() -> RiskTier {
        RiskTier {
            max_position: amt("1000"),
            max_daily_loss: amt("100000"),
            max_order_size: amt("100"),
            max_leverage: 10,
        }
    }

    fn engine() -> (MatchingEngine, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::new());
        let risk = Arc::new(RiskGate::new(tier(), 1000, 1000.0));
        (MatchingEngine::new(config(), ledger.clone(), risk), ledger)
    }

    fn fund(ledger: &Ledger, user: Hash32, usd: &Asset, btc: &Asset) {
        ledger.mint(user, usd, amt("1000000"));
        ledger.mint(user, btc, amt("1000"));
    }

    fn limit_submit(user_id: Hash32, side: Side, price: Amount, qty: Amount, client_id: u64) -> Command {
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
    fn crossing_limit_orders_trade_and_settle() {
        let (mut eng, ledger) = engine();
        let usd = Asset::new("USD");
        let btc = Asset::new("BTC");
        let alice = Hash32::from_bytes(b"alice");
        let bob = Hash32::from_bytes(b"bob");
        fund(&ledger, alice, &usd, &btc);
        fund(&ledger, bob, &usd, &btc);

        let accepted = eng.process(limit_submit(bob, Side::Sell, amt("100.00"), amt("1"), 1), 1);
        assert!(matches!(accepted[0].kind, EventKind::Accepted { .. }));

        let events = eng.process(limit_submit(alice, Side::Buy, amt("100.00"), amt("1"), 2), 2);
        assert!(events.iter().any(|e| matches!(e.kind, EventKind::Trade(_))));
        assert!(events.iter().any(|e| matches!(e.kind, EventKind::Filled { .. })));

        assert_eq!(ledger.balance(alice, &btc).available, amt("1001"));
        assert_eq!(ledger.balance(bob, &usd).available, amt("1000100"));
        assert!(!eng.is_halted());
    }

    #[test]
    fn gtc_remainder_rests_and_cancel_releases_reservation() {
        let (mut eng, ledger) = engine();
        let usd = Asset::new("USD");
        let btc = Asset::new("BTC");
        let alice = Hash32::from_bytes(b"alice");
        fund(&ledger, alice, &usd, &btc);

        let accepted = eng.process(limit_submit(alice, Side::Buy, amt("100.00"), amt("2"), 1), 1);
        let order_id = match &accepted[0].kind {
            EventKind::Accepted { order_id } => *order_id,
            _ => panic!("expected Accepted"),
        };
        assert_eq!(ledger.balance(alice, &usd).locked, amt("200"));

        let cancelled = eng.process(Command::Cancel { user_id: alice, order_id }, 2);
        assert!(matches!(cancelled[0].kind, EventKind::Cancelled { .. }));
        assert_eq!(ledger.balance(alice, &usd).locked, Amount::ZERO);
        assert_eq!(ledger.balance(alice, &usd).available, amt("1000000"));
    }

    #[test]
    fn stop_order_fires_once_last_trade_price_crosses() {
        let (mut eng, ledger) = engine();
        let usd = Asset::new("USD");
        let btc = Asset::new("BTC");
        let alice = Hash32::from_bytes(b"alice");
        let bob = Hash32::from_bytes(b"bob");
        let carol = Hash32::from_bytes(b"carol");
        fund(&ledger, alice, &usd, &btc);
        fund(&ledger, bob, &usd, &btc);
        fund(&ledger, carol, &usd, &btc);

        // Carol parks a buy-stop that fires once price trades at/above 101.
        let stop_req = Command::Submit(SubmitRequest {
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
        eng.process(stop_req, 1);
        assert_eq!(eng.pending_trigger_count(), 1);

        // Bob offers at 101.00; Alice crosses it, printing a last trade at
        // 101.00 and firing Carol's stop as a new market taker.
        eng.process(limit_submit(bob, Side::Sell, amt("101.00"), amt("5"), 2), 2);
        let events = eng.process(limit_submit(alice, Side::Buy, amt("101.00"), amt("1"), 3), 3);

        assert_eq!(eng.pending_trigger_count(), 0);
        assert!(events.iter().any(|e| matches!(e.kind, EventKind::Triggered { .. })));
        assert!(
            events
                .iter()
                .filter(|e| matches!(e.kind, EventKind::Trade(_)))
                .count()
                >= 2
        );
    }

    #[test]
    fn oco_sibling_is_cancelled_when_the_other_leg_fills() {
        let (mut eng, ledger) = engine();
        let usd = Asset::new("USD");
        let btc = Asset::new("BTC");
        let alice = Hash32::from_bytes(b"alice");
        let bob = Hash32::from_bytes(b"bob");
        fund(&ledger, alice, &usd, &btc);
        fund(&ledger, bob, &usd, &btc);

        let first = eng.process(limit_submit(alice, Side::Sell, amt("105.00"), amt("1"), 1), 1);
        let first_id = match &first[0].kind {
            EventKind::Accepted { order_id } => *order_id,
            _ => panic!("expected Accepted"),
        };

        let second_req = Command::Submit(SubmitRequest {
            client_id: 2,
            user_id: alice,
            symbol: "BTC/USD".into(),
            side: Side::Sell,
            kind: OrderKind::OcoLeg {
                sibling_id: first_id,
                inner: Box::new(OrderKind::Stop {
                    stop_price: amt("95.00"),
                }),
            },
            qty: amt("1"),
            tif: TimeInForce::Gtc,
            deadline_ns: None,
        });
        eng.process(second_req, 2);
        assert_eq!(eng.pending_trigger_count(), 1);

        // Bob lifts Alice's resting offer at 105; the OCO stop-loss leg must
        // be cancelled as a cascade of the fill.
        let events = eng.process(limit_submit(bob, Side::Buy, amt("105.00"), amt("1"), 3), 3);
        assert!(events.iter().any(|e| matches!(
            &e.kind,
            EventKind::Cancelled { reason, .. } if reason == "oco_sibling"
        )));
        assert_eq!(eng.pending_trigger_count(), 0);
    }

    #[test]
    fn iceberg_reissues_display_slice_until_hidden_total_is_exhausted() {
        let (mut eng, ledger) = engine();
        let usd = Asset::new("USD");
        let btc = Asset::new("BTC");
        let alice = Hash32::from_bytes(b"alice");
        let bob = Hash32::from_bytes(b"bob");
        fund(&ledger, alice, &usd, &btc);
        fund(&ledger, bob, &usd, &btc);

        let iceberg_req = Command::Submit(SubmitRequest {
            client_id: 1,
            user_id: alice,
            symbol: "BTC/USD".into(),
            side: Side::Sell,
            kind: OrderKind::Iceberg {
                limit_price: amt("100.00"),
                display_qty: amt("1"),
            },
            qty: amt("2.5"),
            tif: TimeInForce::Gtc,
            deadline_ns: None,
        });
        eng.process(iceberg_req, 1);
        assert_eq!(ledger.balance(alice, &btc).locked, amt("2.5"));

        // First 1 BTC taker fill consumes the whole displayed slice and
        // re-issues the next slice automatically.
        eng.process(limit_submit(bob, Side::Buy, amt("100.00"), amt("1"), 2), 2);
        eng.process(limit_submit(bob, Side::Buy, amt("100.00"), amt("1"), 3), 3);
        let events = eng.process(limit_submit(bob, Side::Buy, amt("100.00"), amt("0.5"), 4), 4);

        assert!(events.iter().any(|e| matches!(e.kind, EventKind::Trade(_))));
        assert_eq!(ledger.balance(alice, &btc).locked, Amount::ZERO);
        assert_eq!(ledger.balance(bob, &btc).available, amt("1002.5"));
    }
}
