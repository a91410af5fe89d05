// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position monitor: one supervised task per trade, polling the venue until
//! the position is closed or the trade is canceled.

use super::desk::{TradeDesk, TradePhase};
use super::events::{CloseReason, EventSender, TradeEvent};
use super::orders::OrderSlot;
use super::risk::{self, StopMove};
use super::TradeError;
use crate::exchange::OrderStatus;
use crate::plan::{Side, TakeProfit, TpLevel, TradePlan, ValidationError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Remaining size at or below this counts as flat.
const FLAT_EPSILON: f64 = 1e-9;

/// What one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub phase: TradePhase,
    pub events: Vec<TradeEvent>,
}

/// Run one supervision step under the desk lock.
///
/// Only a failed price fetch or entry poll is returned as an error; failures
/// after the entry filled are logged and retried on the next tick.
pub async fn tick(desk: &mut TradeDesk) -> Result<TickReport, TradeError> {
    let mut events = Vec::new();
    if desk.phase.is_finished() || !desk.plan.state.active {
        return Ok(TickReport {
            phase: desk.phase,
            events,
        });
    }

    let instrument = desk
        .plan
        .instrument
        .clone()
        .ok_or(ValidationError::NotReady("Pair not set"))?;
    let price = desk
        .orders
        .gateway()
        .get_ticker(&instrument)
        .await
        .map_err(TradeError::gateway("Failed to fetch ticker"))?
        .last;
    debug!("{} last price {}", instrument, price);

    if desk.phase == TradePhase::AwaitingEntry {
        check_entry(desk, price, &mut events).await?;
    }
    if desk.phase == TradePhase::ManagingPosition {
        manage_position(desk, price, &mut events).await;
    }

    desk.persist_or_log();
    Ok(TickReport {
        phase: desk.phase,
        events,
    })
}

async fn check_entry(desk: &mut TradeDesk, price: f64, events: &mut Vec<TradeEvent>) -> Result<(), TradeError> {
    let fill_price = if desk.plan.dry_run {
        match (desk.plan.side, desk.plan.entry_price) {
            _ if desk.plan.state.entry_filled => desk.plan.entry_price.unwrap_or(price),
            (Some(side), Some(entry)) if side.entry_crossed(price, entry) => {
                desk.plan.state.entry_filled = true;
                desk.plan.state.position_size = desk.plan.amount;
                info!("🧪 DRY RUN: Entry filled at {}", price);
                price
            }
            _ => return Ok(()),
        }
    } else {
        let Some(report) = desk.orders.poll_slot(&desk.plan, OrderSlot::Entry).await? else {
            abort(desk, "entry order is no longer tracked", events).await;
            return Ok(());
        };
        let amount = desk.plan.amount.unwrap_or(report.filled);
        match report.status {
            OrderStatus::Open => return Ok(()),
            OrderStatus::Canceled if report.filled <= FLAT_EPSILON => {
                abort(desk, "entry order canceled on exchange", events).await;
                return Ok(());
            }
            // Expired or canceled after a partial fill: the executed part is a real position.
            OrderStatus::Canceled => {
                let size = report.filled.min(amount);
                desk.plan.state.entry_filled = true;
                desk.plan.state.position_size = Some(size);
                warn!(
                    "📥 Entry order canceled after partial fill: {} of {} at {:?}",
                    size, amount, report.average
                );
                report.average.or(desk.plan.entry_price).unwrap_or(price)
            }
            OrderStatus::Filled => {
                let size = if report.filled > 0.0 {
                    report.filled.min(amount)
                } else {
                    amount
                };
                desk.plan.state.entry_filled = true;
                desk.plan.state.position_size = Some(size);
                info!("📥 Entry order filled: {} at {:?}", report.filled, report.average);
                report.average.or(desk.plan.entry_price).unwrap_or(price)
            }
        }
    };

    events.push(TradeEvent::EntryFilled {
        instrument: desk.plan.instrument.clone().unwrap_or_default(),
        price: fill_price,
        size: desk.plan.state.position_size.unwrap_or_default(),
    });

    if desk.plan.stop_loss.is_some() {
        if let Err(e) = desk.orders.submit_stop_loss(&desk.plan).await {
            protective_failed(OrderSlot::StopLoss, e, events);
        }
    }
    let levels: Vec<TpLevel> = desk.plan.configured_take_profits().map(|(level, _)| level).collect();
    for level in levels {
        if let Err(e) = desk.orders.submit_take_profit(&desk.plan, level).await {
            protective_failed(OrderSlot::TakeProfit(level), e, events);
        }
    }

    desk.phase = TradePhase::ManagingPosition;
    Ok(())
}

async fn manage_position(desk: &mut TradeDesk, price: f64, events: &mut Vec<TradeEvent>) {
    let Some(side) = desk.plan.side else {
        return;
    };

    let pending: Vec<(TpLevel, TakeProfit)> = desk
        .plan
        .configured_take_profits()
        .filter(|(level, _)| !desk.plan.tp_filled(*level))
        .collect();
    for (level, tp) in pending {
        let filled_at = if desk.plan.dry_run {
            side.reached_target(price, tp.price).then_some(price)
        } else {
            match desk.orders.poll_slot(&desk.plan, OrderSlot::TakeProfit(level)).await {
                Ok(Some(report)) if report.status == OrderStatus::Filled => {
                    Some(report.average.unwrap_or(tp.price))
                }
                Ok(Some(report)) if report.status == OrderStatus::Canceled => {
                    warn!("{} order canceled on exchange", level);
                    None
                }
                Ok(_) => None,
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            }
        };
        if let Some(fill) = filled_at {
            apply_take_profit(&mut desk.plan, level, tp, fill, events);
        }
    }
    // Trailing may be switched on after a level has already filled.
    if desk.plan.any_tp_filled() {
        arm_trailing(&mut desk.plan, price);
    }

    if stop_hit(desk, side, price).await {
        close(desk, CloseReason::StopLoss, events).await;
        return;
    }
    rearm_stop(desk).await;

    if let Some(decision) = risk::break_even_decision(&desk.plan) {
        if move_stop(desk, decision, events).await {
            desk.plan.state.break_even_applied = true;
        }
    }

    if let Some(update) = risk::trailing_decision(&desk.plan, price) {
        desk.plan.state.extreme_price = Some(update.extreme);
        if let Some(decision) = update.stop_move {
            move_stop(desk, decision, events).await;
        }
    }

    let remaining = desk.plan.state.position_size.unwrap_or_default();
    if remaining <= FLAT_EPSILON {
        close(desk, CloseReason::PositionFlat, events).await;
    } else if desk.plan.all_configured_tps_filled() && desk.plan.stop_loss.is_none() {
        close(desk, CloseReason::TakeProfits, events).await;
    }
}

/// Book a take-profit fill against the size held just before it.
fn apply_take_profit(plan: &mut TradePlan, level: TpLevel, tp: TakeProfit, fill: f64, events: &mut Vec<TradeEvent>) {
    let before = plan.state.position_size.unwrap_or_default();
    let after = (before - before * tp.percent / 100.0).max(0.0);
    plan.state.position_size = Some(after);
    plan.mark_tp_filled(level);
    info!("🎯 {} filled at {} (size {} -> {})", level, fill, before, after);
    events.push(TradeEvent::TakeProfitFilled {
        level,
        price: fill,
        remaining: after,
    });

    arm_trailing(plan, fill);
}

/// Seed trailing from `price` once it is enabled; no-op while disabled or already armed.
fn arm_trailing(plan: &mut TradePlan, price: f64) {
    if plan.trailing_stop_percent.is_some() && !plan.state.trailing_active {
        plan.state.trailing_active = true;
        plan.state.extreme_price = Some(price);
        info!("📈 Trailing stop armed from {}", price);
    }
}

async fn stop_hit(desk: &mut TradeDesk, side: Side, price: f64) -> bool {
    if desk.plan.dry_run {
        return desk.plan.stop_loss.is_some_and(|stop| side.reached_stop(price, stop));
    }
    match desk.orders.poll_slot(&desk.plan, OrderSlot::StopLoss).await {
        Ok(Some(report)) => report.status == OrderStatus::Filled,
        Ok(None) => false,
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

/// Live only: put a stop back when the plan has one but the venue does not.
async fn rearm_stop(desk: &mut TradeDesk) {
    if desk.plan.dry_run || desk.plan.stop_loss.is_none() || desk.orders.book().contains(OrderSlot::StopLoss) {
        return;
    }
    if let Err(e) = desk.orders.submit_stop_loss(&desk.plan).await {
        warn!("Stop loss still missing: {}", e);
    }
}

/// Returns true when the stored stop price now equals the decision, even if
/// the replacement order itself failed (it is re-armed next tick).
async fn move_stop(desk: &mut TradeDesk, decision: StopMove, events: &mut Vec<TradeEvent>) -> bool {
    let result = desk.orders.replace_stop_loss(&mut desk.plan, decision.price).await;
    if let Err(e) = &result {
        warn!("Failed to move stop loss ({}): {}", decision.reason, e);
    }

    let moved = desk.plan.stop_loss == Some(decision.price);
    if moved {
        info!("🛡️ Stop loss moved to {} ({})", decision.price, decision.reason);
        events.push(TradeEvent::StopMoved {
            price: decision.price,
            reason: decision.reason,
        });
    }
    moved
}

fn protective_failed(slot: OrderSlot, e: TradeError, events: &mut Vec<TradeEvent>) {
    error!("Failed to place {} order: {}", slot, e);
    events.push(TradeEvent::ProtectiveOrderFailed {
        slot,
        error: e.to_string(),
    });
}

async fn close(desk: &mut TradeDesk, reason: CloseReason, events: &mut Vec<TradeEvent>) {
    let instrument = desk.plan.instrument.clone().unwrap_or_default();
    let report = desk.orders.cancel_all(&mut desk.plan).await;
    info!(
        "🏁 Trade on {} closed ({:?}); leftovers cancelled: {}, failed: {}",
        instrument, reason, report.cancelled, report.failed
    );
    desk.phase = TradePhase::Closed;
    desk.stop_monitor();
    events.push(TradeEvent::Closed { instrument, reason });
}

async fn abort(desk: &mut TradeDesk, reason: &str, events: &mut Vec<TradeEvent>) {
    warn!("❌ Aborting trade: {}", reason);
    desk.orders.cancel_all(&mut desk.plan).await;
    desk.phase = TradePhase::Canceled;
    desk.stop_monitor();
    events.push(TradeEvent::Aborted {
        reason: reason.to_string(),
    });
}

/// Spawn the supervision loop for the current trade.
///
/// Cancellation is checked before each tick and again once the desk lock is
/// held; an in-flight tick always runs to completion.
pub fn spawn_monitor(
    desk: Arc<Mutex<TradeDesk>>,
    token: CancellationToken,
    interval: Duration,
    events: EventSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("📊 Position monitor started (checking every {:?})", interval);

        loop {
            if token.is_cancelled() {
                break;
            }

            let report = {
                let mut desk = desk.lock().await;
                if token.is_cancelled() {
                    break;
                }
                match tick(&mut desk).await {
                    Ok(report) => report,
                    Err(e) => {
                        error!("Monitor tick failed: {}", e);
                        TickReport {
                            phase: desk.phase,
                            events: Vec::new(),
                        }
                    }
                }
            };

            for event in report.events {
                if events.send(event).await.is_err() {
                    debug!("No event listener");
                }
            }
            if report.phase.is_finished() {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Position monitor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::{MockGateway, OrderKind};
    use crate::plan::{BreakEvenTrigger, PlanStore};
    use crate::trading::events;
    use crate::trading::orders::OrderCoordinator;
    use crate::trading::risk::StopReason;

    struct Harness {
        gateway: Arc<MockGateway>,
        desk: TradeDesk,
        _dir: tempfile::TempDir,
    }

    fn harness(configure: impl FnOnce(&mut TradePlan)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::with_price(100.0));
        let mut plan = TradePlan::default();
        plan.set_pair("BTC/USDT").unwrap();
        plan.set_side(Side::Long);
        plan.set_amount(1.0).unwrap();
        plan.set_entry(0.0).unwrap();
        configure(&mut plan);

        let desk = TradeDesk::new(
            plan,
            PlanStore::new(dir.path().join("plan.json")),
            OrderCoordinator::new(gateway.clone()),
        );
        Harness {
            gateway,
            desk,
            _dir: dir,
        }
    }

    async fn start(h: &mut Harness) {
        h.desk.plan.reset_execution_state();
        h.desk.plan.state.active = true;
        h.desk.orders.submit_entry(&mut h.desk.plan).await.unwrap();
        h.desk.phase = TradePhase::AwaitingEntry;
    }

    async fn tick_at(h: &mut Harness, price: f64) -> TickReport {
        h.gateway.set_price(price);
        tick(&mut h.desk).await.unwrap()
    }

    fn stop_moves(events: &[TradeEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, TradeEvent::StopMoved { .. }))
            .count()
    }

    #[tokio::test]
    async fn dry_run_market_entry_then_first_take_profit() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 50.0).unwrap();
            plan.set_stop_loss(98.0).unwrap();
        });
        start(&mut h).await;

        let report = tick_at(&mut h, 100.0).await;
        assert_eq!(report.phase, TradePhase::ManagingPosition);
        assert_eq!(
            report.events,
            vec![TradeEvent::EntryFilled {
                instrument: "BTC/USDT".to_string(),
                price: 100.0,
                size: 1.0
            }]
        );
        assert!(h.desk.plan.state.entry_filled);
        assert_eq!(h.desk.plan.state.position_size, Some(1.0));

        let report = tick_at(&mut h, 100.5).await;
        assert!(report.events.is_empty());
        assert_eq!(h.desk.plan.state.position_size, Some(1.0));

        let report = tick_at(&mut h, 101.2).await;
        assert_eq!(h.desk.plan.state.position_size, Some(0.5));
        assert!(h.desk.plan.tp_filled(TpLevel::ALL[0]));
        assert!(matches!(
            report.events[0],
            TradeEvent::TakeProfitFilled { remaining, .. } if remaining == 0.5
        ));

        // Further ticks neither refill the entry nor the level.
        let report = tick_at(&mut h, 102.0).await;
        assert!(report.events.is_empty());
        assert_eq!(h.desk.plan.state.position_size, Some(0.5));
        assert_eq!(h.gateway.count_calls("create_stop_order"), 0);
        assert_eq!(h.gateway.count_calls("create_limit_order"), 0);
        assert_eq!(h.gateway.count_calls("create_exit_limit_order"), 0);
    }

    #[tokio::test]
    async fn take_profits_compound_on_remaining_size() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 50.0).unwrap();
            plan.set_take_profit(2, 102.0, 50.0).unwrap();
            plan.set_stop_loss(98.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        tick_at(&mut h, 101.0).await;
        assert_eq!(h.desk.plan.state.position_size, Some(0.5));
        tick_at(&mut h, 102.0).await;
        assert_eq!(h.desk.plan.state.position_size, Some(0.25));
        assert_eq!(h.desk.phase, TradePhase::ManagingPosition);
    }

    #[tokio::test]
    async fn full_exit_closes_the_trade() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 100.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        let report = tick_at(&mut h, 101.0).await;
        assert_eq!(report.phase, TradePhase::Closed);
        assert!(matches!(
            report.events.last(),
            Some(TradeEvent::Closed { reason: CloseReason::PositionFlat, .. })
        ));
        assert!(!h.desk.plan.state.active);
        assert_eq!(h.desk.plan.state.position_size, None);
        assert_eq!(h.desk.plan.take_profit(TpLevel::ALL[0]).map(|tp| tp.price), Some(101.0));

        // A finished trade is left alone.
        let report = tick_at(&mut h, 90.0).await;
        assert!(report.events.is_empty());
    }

    #[tokio::test]
    async fn configured_levels_filled_without_stop_closes() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 40.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        let report = tick_at(&mut h, 101.0).await;
        assert_eq!(report.phase, TradePhase::Closed);
        assert!(matches!(
            report.events.last(),
            Some(TradeEvent::Closed { reason: CloseReason::TakeProfits, .. })
        ));
    }

    #[tokio::test]
    async fn dry_run_stop_loss_closes_the_trade() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 105.0, 50.0).unwrap();
            plan.set_stop_loss(98.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        let report = tick_at(&mut h, 99.0).await;
        assert_eq!(report.phase, TradePhase::ManagingPosition);

        let report = tick_at(&mut h, 97.5).await;
        assert_eq!(report.phase, TradePhase::Closed);
        assert!(matches!(
            report.events.last(),
            Some(TradeEvent::Closed { reason: CloseReason::StopLoss, .. })
        ));
        assert!(!h.desk.plan.state.active);
    }

    #[tokio::test]
    async fn break_even_waits_for_trigger_and_applies_once() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 30.0).unwrap();
            plan.set_take_profit(2, 103.0, 30.0).unwrap();
            plan.set_stop_loss(98.0).unwrap();
            plan.set_break_even(BreakEvenTrigger::Tp2);
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        let report = tick_at(&mut h, 102.0).await;
        assert!(h.desk.plan.tp_filled(TpLevel::ALL[0]));
        assert_eq!(stop_moves(&report.events), 0);
        assert_eq!(h.desk.plan.stop_loss, Some(98.0));

        let report = tick_at(&mut h, 103.0).await;
        assert_eq!(stop_moves(&report.events), 1);
        assert_eq!(h.desk.plan.stop_loss, Some(100.0));
        assert!(h.desk.plan.state.break_even_applied);

        for price in [103.5, 104.0, 102.5] {
            let report = tick_at(&mut h, price).await;
            assert_eq!(stop_moves(&report.events), 0);
        }
        assert_eq!(h.desk.plan.stop_loss, Some(100.0));
    }

    #[tokio::test]
    async fn trailing_starts_after_take_profit_and_only_tightens() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 105.0, 50.0).unwrap();
            plan.set_stop_loss(95.0).unwrap();
            plan.set_trailing_stop(2.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        let report = tick_at(&mut h, 104.0).await;
        assert_eq!(stop_moves(&report.events), 0);
        assert!(!h.desk.plan.state.trailing_active);

        let report = tick_at(&mut h, 105.0).await;
        assert!(h.desk.plan.state.trailing_active);
        assert_eq!(stop_moves(&report.events), 1);
        let first = h.desk.plan.stop_loss.unwrap();
        assert!((first - 102.9).abs() < 1e-9);

        tick_at(&mut h, 110.0).await;
        let second = h.desk.plan.stop_loss.unwrap();
        assert!((second - 107.8).abs() < 1e-9);

        let report = tick_at(&mut h, 108.0).await;
        assert_eq!(stop_moves(&report.events), 0);
        assert_eq!(h.desk.plan.stop_loss, Some(second));

        let report = tick_at(&mut h, 107.0).await;
        assert_eq!(report.phase, TradePhase::Closed);
    }

    #[tokio::test]
    async fn ticker_failure_is_reported_without_state_change() {
        let mut h = harness(|plan| {
            plan.set_stop_loss(98.0).unwrap();
        });
        start(&mut h).await;
        h.gateway.fail("get_ticker");

        let err = tick(&mut h.desk).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to fetch ticker"));
        assert_eq!(h.desk.phase, TradePhase::AwaitingEntry);
        assert!(h.desk.plan.state.active);
    }

    #[tokio::test]
    async fn live_fills_are_polled_from_order_status() {
        let mut h = harness(|plan| {
            plan.set_dry_run(false);
            plan.set_entry(99.0).unwrap();
            plan.set_take_profit(1, 105.0, 50.0).unwrap();
            plan.set_stop_loss(95.0).unwrap();
        });
        start(&mut h).await;
        let entry = h.desk.orders.book().get(OrderSlot::Entry).cloned().unwrap();

        let report = tick_at(&mut h, 99.5).await;
        assert_eq!(report.phase, TradePhase::AwaitingEntry);
        assert!(report.events.is_empty());

        h.gateway.fill(&entry);
        let report = tick_at(&mut h, 99.0).await;
        assert_eq!(report.phase, TradePhase::ManagingPosition);
        assert_eq!(h.desk.plan.state.position_size, Some(1.0));
        assert!(!h.desk.orders.book().contains(OrderSlot::Entry));

        let stop = h.desk.orders.book().get(OrderSlot::StopLoss).cloned().unwrap();
        let tp1 = h
            .desk
            .orders
            .book()
            .get(OrderSlot::TakeProfit(TpLevel::ALL[0]))
            .cloned()
            .unwrap();
        assert_eq!(h.gateway.order(&stop).kind, OrderKind::Stop);
        assert_eq!(h.gateway.order(&tp1).amount, 0.5);

        h.gateway.fill(&tp1);
        tick_at(&mut h, 105.0).await;
        assert!(h.desk.plan.tp_filled(TpLevel::ALL[0]));
        assert_eq!(h.desk.plan.state.position_size, Some(0.5));

        h.gateway.fill(&stop);
        let report = tick_at(&mut h, 95.0).await;
        assert_eq!(report.phase, TradePhase::Closed);
        assert!(h.desk.orders.book().is_empty());
    }

    #[tokio::test]
    async fn live_entry_canceled_on_venue_aborts() {
        let mut h = harness(|plan| {
            plan.set_dry_run(false);
            plan.set_entry(99.0).unwrap();
        });
        start(&mut h).await;
        let entry = h.desk.orders.book().get(OrderSlot::Entry).cloned().unwrap();
        h.gateway.cancel_on_venue(&entry);

        let report = tick_at(&mut h, 100.0).await;
        assert_eq!(report.phase, TradePhase::Canceled);
        assert!(matches!(report.events[0], TradeEvent::Aborted { .. }));
        assert!(!h.desk.plan.state.active);
    }

    #[tokio::test]
    async fn protective_failure_keeps_position_supervised() {
        let mut h = harness(|plan| {
            plan.set_dry_run(false);
            plan.set_entry(99.0).unwrap();
            plan.set_stop_loss(95.0).unwrap();
        });
        start(&mut h).await;
        let entry = h.desk.orders.book().get(OrderSlot::Entry).cloned().unwrap();
        h.gateway.fill(&entry);
        h.gateway.fail("create_stop_order");

        let report = tick_at(&mut h, 99.0).await;
        assert_eq!(report.phase, TradePhase::ManagingPosition);
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e, TradeEvent::ProtectiveOrderFailed { slot: OrderSlot::StopLoss, .. })));
        assert!(h.desk.plan.state.active);
        assert!(h.desk.plan.state.entry_filled);

        h.gateway.recover("create_stop_order");
        tick_at(&mut h, 99.0).await;
        assert!(h.desk.orders.book().contains(OrderSlot::StopLoss));
    }

    #[tokio::test]
    async fn break_even_event_reports_reason() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 50.0).unwrap();
            plan.set_stop_loss(98.0).unwrap();
            plan.set_break_even(BreakEvenTrigger::Tp1);
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        let report = tick_at(&mut h, 101.0).await;
        assert!(report.events.contains(&TradeEvent::StopMoved {
            price: 100.0,
            reason: StopReason::BreakEven
        }));
    }

    #[tokio::test]
    async fn trailing_enabled_after_take_profit_starts_from_current_price() {
        let mut h = harness(|plan| {
            plan.set_take_profit(1, 101.0, 30.0).unwrap();
            plan.set_stop_loss(95.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;
        tick_at(&mut h, 101.0).await;
        assert!(h.desk.plan.tp_filled(TpLevel::ALL[0]));
        assert!(!h.desk.plan.state.trailing_active);

        h.desk.plan.set_trailing_stop(2.0).unwrap();
        let report = tick_at(&mut h, 110.0).await;
        assert!(h.desk.plan.state.trailing_active);
        assert_eq!(h.desk.plan.state.extreme_price, Some(110.0));
        assert_eq!(stop_moves(&report.events), 1);
        assert!((h.desk.plan.stop_loss.unwrap() - 107.8).abs() < 1e-9);

        tick_at(&mut h, 120.0).await;
        assert!((h.desk.plan.stop_loss.unwrap() - 117.6).abs() < 1e-9);
        tick_at(&mut h, 130.0).await;
        assert!((h.desk.plan.stop_loss.unwrap() - 127.4).abs() < 1e-9);
        assert_eq!(h.desk.phase, TradePhase::ManagingPosition);
    }

    #[tokio::test]
    async fn live_entry_canceled_after_partial_fill_keeps_the_position() {
        let mut h = harness(|plan| {
            plan.set_dry_run(false);
            plan.set_entry(99.0).unwrap();
            plan.set_take_profit(1, 105.0, 50.0).unwrap();
            plan.set_stop_loss(95.0).unwrap();
        });
        start(&mut h).await;
        let entry = h.desk.orders.book().get(OrderSlot::Entry).cloned().unwrap();
        h.gateway.cancel_partially_filled(&entry, 0.4);

        let report = tick_at(&mut h, 99.0).await;
        assert_eq!(report.phase, TradePhase::ManagingPosition);
        assert_eq!(
            report.events[0],
            TradeEvent::EntryFilled {
                instrument: "BTC/USDT".to_string(),
                price: 99.0,
                size: 0.4
            }
        );
        assert!(!report.events.iter().any(|e| matches!(e, TradeEvent::Aborted { .. })));
        assert!(h.desk.plan.state.active);
        assert!(h.desk.plan.state.entry_filled);
        assert_eq!(h.desk.plan.state.position_size, Some(0.4));

        let stop = h.desk.orders.book().get(OrderSlot::StopLoss).cloned().unwrap();
        assert_eq!(h.gateway.order(&stop).amount, 0.4);
        let tp1 = h
            .desk
            .orders
            .book()
            .get(OrderSlot::TakeProfit(TpLevel::ALL[0]))
            .cloned()
            .unwrap();
        assert_eq!(h.gateway.order(&tp1).amount, 0.2);
    }

    #[tokio::test]
    async fn short_take_profit_moves_stop_to_break_even_then_stop_closes() {
        let mut h = harness(|plan| {
            plan.set_side(Side::Short);
            plan.set_take_profit(1, 95.0, 50.0).unwrap();
            plan.set_stop_loss(103.0).unwrap();
            plan.set_break_even(BreakEvenTrigger::Tp1);
        });
        start(&mut h).await;

        let report = tick_at(&mut h, 100.0).await;
        assert_eq!(report.phase, TradePhase::ManagingPosition);
        assert_eq!(h.desk.plan.state.position_size, Some(1.0));

        // Above the target and below the stop: nothing happens.
        let report = tick_at(&mut h, 96.0).await;
        assert!(report.events.is_empty());

        let report = tick_at(&mut h, 94.5).await;
        assert!(h.desk.plan.tp_filled(TpLevel::ALL[0]));
        assert_eq!(h.desk.plan.state.position_size, Some(0.5));
        assert!(report.events.contains(&TradeEvent::StopMoved {
            price: 100.0,
            reason: StopReason::BreakEven
        }));
        assert_eq!(h.desk.plan.stop_loss, Some(100.0));

        let report = tick_at(&mut h, 99.0).await;
        assert!(report.events.is_empty());
        assert_eq!(report.phase, TradePhase::ManagingPosition);

        let report = tick_at(&mut h, 100.5).await;
        assert_eq!(report.phase, TradePhase::Closed);
        assert!(matches!(
            report.events.last(),
            Some(TradeEvent::Closed { reason: CloseReason::StopLoss, .. })
        ));
        assert!(!h.desk.plan.state.active);
    }

    #[tokio::test]
    async fn short_trailing_follows_the_low() {
        let mut h = harness(|plan| {
            plan.set_side(Side::Short);
            plan.set_take_profit(1, 95.0, 50.0).unwrap();
            plan.set_stop_loss(103.0).unwrap();
            plan.set_trailing_stop(2.0).unwrap();
        });
        start(&mut h).await;
        tick_at(&mut h, 100.0).await;

        tick_at(&mut h, 94.0).await;
        assert!(h.desk.plan.state.trailing_active);
        assert!((h.desk.plan.stop_loss.unwrap() - 95.88).abs() < 1e-9);

        tick_at(&mut h, 90.0).await;
        let trailed = h.desk.plan.stop_loss.unwrap();
        assert!((trailed - 91.8).abs() < 1e-9);

        let report = tick_at(&mut h, 91.0).await;
        assert_eq!(stop_moves(&report.events), 0);
        assert_eq!(h.desk.plan.stop_loss, Some(trailed));

        let report = tick_at(&mut h, 92.0).await;
        assert_eq!(report.phase, TradePhase::Closed);
        assert!(matches!(
            report.events.last(),
            Some(TradeEvent::Closed { reason: CloseReason::StopLoss, .. })
        ));
    }

    #[tokio::test]
    async fn supervised_loop_runs_until_close() {
        let mut h = harness(|plan| {
            plan.set_stop_loss(98.0).unwrap();
        });
        start(&mut h).await;
        let gateway = h.gateway.clone();
        let desk = Arc::new(Mutex::new(h.desk));
        let (tx, mut rx) = events::channel(16);
        let token = CancellationToken::new();
        desk.lock().await.attach_monitor(token.clone());

        let handle = spawn_monitor(desk.clone(), token, Duration::from_millis(5), tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, TradeEvent::EntryFilled { .. }));

        gateway.set_price(97.0);
        let closed = rx.recv().await.unwrap();
        assert!(matches!(closed, TradeEvent::Closed { reason: CloseReason::StopLoss, .. }));

        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        let desk = desk.lock().await;
        assert_eq!(desk.phase, TradePhase::Closed);
        assert!(!desk.is_monitoring());
    }

    #[tokio::test]
    async fn supervised_loop_stops_on_cancel() {
        let mut h = harness(|plan| {
            plan.set_dry_run(false);
            plan.set_entry(90.0).unwrap();
        });
        start(&mut h).await;
        let desk = Arc::new(Mutex::new(h.desk));
        let (tx, _rx) = events::channel(16);
        let token = CancellationToken::new();

        let handle = spawn_monitor(desk.clone(), token.clone(), Duration::from_millis(5), tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(desk.lock().await.phase, TradePhase::AwaitingEntry);
    }
}
