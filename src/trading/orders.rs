// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Order coordination: turns the plan into venue orders and tracks their handles.

use super::TradeError;
use crate::exchange::{ExchangeGateway, OrderId, OrderReport};
use crate::plan::{TpLevel, TradePlan, ValidationError};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Logical role of a venue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderSlot {
    Entry,
    StopLoss,
    TakeProfit(TpLevel),
}

impl fmt::Display for OrderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSlot::Entry => write!(f, "entry"),
            OrderSlot::StopLoss => write!(f, "stop loss"),
            OrderSlot::TakeProfit(level) => write!(f, "{}", level),
        }
    }
}

/// Live order handles by slot. A handle leaves the book once its order is
/// terminal and is never handed out again.
#[derive(Debug, Default)]
pub struct OrderBook {
    handles: HashMap<OrderSlot, OrderId>,
}

impl OrderBook {
    pub fn get(&self, slot: OrderSlot) -> Option<&OrderId> {
        self.handles.get(&slot)
    }

    pub fn contains(&self, slot: OrderSlot) -> bool {
        self.handles.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn track(&mut self, slot: OrderSlot, id: OrderId) {
        if let Some(previous) = self.handles.insert(slot, id) {
            warn!("Replaced untracked {} handle {}", slot, previous);
        }
    }

    fn release(&mut self, slot: OrderSlot) -> Option<OrderId> {
        self.handles.remove(&slot)
    }

    fn drain(&mut self) -> Vec<(OrderSlot, OrderId)> {
        self.handles.drain().collect()
    }
}

/// Outcome of a best-effort mass cancel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelReport {
    pub cancelled: usize,
    pub failed: usize,
}

/// Submits and cancels the orders of the single trade.
pub struct OrderCoordinator {
    gateway: Arc<dyn ExchangeGateway>,
    book: OrderBook,
}

impl OrderCoordinator {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            gateway,
            book: OrderBook::default(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Open the position. Market entries (price 0) are resolved to the last
    /// price first and the resolved price is written back to the plan.
    pub async fn submit_entry(&mut self, plan: &mut TradePlan) -> Result<(), TradeError> {
        let instrument = instrument(plan)?;
        let side = plan.side.ok_or(ValidationError::NotReady("Side not set"))?;
        let amount = plan.amount.ok_or(ValidationError::NotReady("Amount not set"))?;

        if plan.is_market_entry() {
            let ticker = self
                .gateway
                .get_ticker(&instrument)
                .await
                .map_err(TradeError::gateway("Failed to get market price"))?;
            plan.entry_price = Some(ticker.last);
            info!("Market order: entry price set to current market price {}", ticker.last);
        }
        let entry = plan
            .entry_price
            .ok_or(ValidationError::NotReady("Entry price not set"))?;

        if plan.dry_run {
            info!(
                "🧪 DRY RUN: {} entry for {} {} at {} filled",
                side, amount, instrument, entry
            );
            plan.state.entry_filled = true;
            plan.state.position_size = Some(amount);
            return Ok(());
        }

        let report = self
            .gateway
            .create_limit_order(&instrument, side.entry_order_side(), amount, entry)
            .await
            .map_err(TradeError::gateway("Failed to place entry order"))?;
        info!("📥 Entry order placed: {} ({} {} @ {})", report.id, side, amount, entry);
        self.book.track(OrderSlot::Entry, report.id);
        Ok(())
    }

    /// Protective stop sized to the whole remaining position. No venue call in dry-run.
    pub async fn submit_stop_loss(&mut self, plan: &TradePlan) -> Result<(), TradeError> {
        let stop = plan.stop_loss.ok_or(ValidationError::NotReady("Stop loss not set"))?;
        let size = open_size(plan)?;
        let side = plan.side.ok_or(ValidationError::NotReady("Side not set"))?;

        if plan.dry_run {
            info!("🧪 DRY RUN: stop loss at {} for {}", stop, size);
            return Ok(());
        }

        let report = self
            .gateway
            .create_stop_order(&instrument(plan)?, side.exit_order_side(), size, stop)
            .await
            .map_err(TradeError::gateway("Failed to place stop loss"))?;
        info!("🛡️ Stop loss placed: {} @ {}", report.id, stop);
        self.book.track(OrderSlot::StopLoss, report.id);
        Ok(())
    }

    /// Limit exit for `percent` of the current position. No venue call in dry-run.
    pub async fn submit_take_profit(&mut self, plan: &TradePlan, level: TpLevel) -> Result<(), TradeError> {
        let tp = plan
            .take_profit(level)
            .ok_or(ValidationError::NotReady("Take profit not set"))?;
        let size = open_size(plan)?;
        let side = plan.side.ok_or(ValidationError::NotReady("Side not set"))?;
        let partial = size * tp.percent / 100.0;

        if plan.dry_run {
            info!(
                "🧪 DRY RUN: {} at {} for {} ({}%)",
                level, tp.price, partial, tp.percent
            );
            return Ok(());
        }

        let report = self
            .gateway
            .create_exit_limit_order(&instrument(plan)?, side.exit_order_side(), partial, tp.price)
            .await
            .map_err(TradeError::gateway("Failed to place take profit"))?;
        info!("🎯 {} placed: {} ({} @ {})", level, report.id, partial, tp.price);
        self.book.track(OrderSlot::TakeProfit(level), report.id);
        Ok(())
    }

    /// Move the stop: cancel the resting stop (live only), store the new
    /// price, submit a fresh stop.
    pub async fn replace_stop_loss(&mut self, plan: &mut TradePlan, new_price: f64) -> Result<(), TradeError> {
        if !new_price.is_finite() || new_price <= 0.0 {
            return Err(ValidationError::InvalidStopLoss.into());
        }

        if !plan.dry_run {
            if let Some(id) = self.book.get(OrderSlot::StopLoss).cloned() {
                self.gateway
                    .cancel_order(&instrument(plan)?, &id)
                    .await
                    .map_err(TradeError::gateway("Failed to cancel stop loss"))?;
                self.book.release(OrderSlot::StopLoss);
            }
        }

        plan.stop_loss = Some(new_price);
        self.submit_stop_loss(plan).await
    }

    /// Refresh a live order. The handle is dropped once the order is terminal.
    pub async fn poll_slot(&mut self, plan: &TradePlan, slot: OrderSlot) -> Result<Option<OrderReport>, TradeError> {
        let Some(id) = self.book.get(slot).cloned() else {
            return Ok(None);
        };

        let report = self
            .gateway
            .get_order_status(&instrument(plan)?, &id)
            .await
            .map_err(TradeError::gateway("Failed to query order status"))?;
        if report.status.is_terminal() {
            self.book.release(slot);
        }
        Ok(Some(report))
    }

    /// Cancel everything tracked, clear the book and reset execution state.
    /// Individual cancel failures are logged and counted.
    pub async fn cancel_all(&mut self, plan: &mut TradePlan) -> CancelReport {
        let mut report = CancelReport::default();
        let handles = self.book.drain();

        if !handles.is_empty() {
            match plan.instrument.clone() {
                Some(instrument) => {
                    for (slot, id) in handles {
                        match self.gateway.cancel_order(&instrument, &id).await {
                            Ok(()) => {
                                info!("Cancelled {} order: {}", slot, id);
                                report.cancelled += 1;
                            }
                            Err(e) => {
                                warn!("Error cancelling {} order {}: {}", slot, id, e);
                                report.failed += 1;
                            }
                        }
                    }
                }
                None => report.failed = handles.len(),
            }
        }

        plan.reset_execution_state();
        report
    }
}

fn instrument(plan: &TradePlan) -> Result<String, ValidationError> {
    plan.instrument.clone().ok_or(ValidationError::NotReady("Pair not set"))
}

fn open_size(plan: &TradePlan) -> Result<f64, ValidationError> {
    plan.state
        .position_size
        .filter(|size| *size > 0.0)
        .ok_or(ValidationError::NotReady("No open position"))
}
