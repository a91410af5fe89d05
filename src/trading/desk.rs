// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! The trade desk: everything one trade needs, behind a single lock.

use super::orders::OrderCoordinator;
use super::TradeError;
use crate::plan::{PlanStore, TradePlan};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Lifecycle of the single trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradePhase {
    #[default]
    Idle,
    Submitting,
    AwaitingEntry,
    ManagingPosition,
    Closed,
    Canceled,
}

impl TradePhase {
    /// The monitor has nothing left to supervise.
    pub fn is_finished(self) -> bool {
        matches!(self, TradePhase::Idle | TradePhase::Closed | TradePhase::Canceled)
    }
}

impl fmt::Display for TradePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradePhase::Idle => "idle",
            TradePhase::Submitting => "submitting",
            TradePhase::AwaitingEntry => "awaiting entry",
            TradePhase::ManagingPosition => "managing position",
            TradePhase::Closed => "closed",
            TradePhase::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// Derived summary of the running trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStatus {
    pub phase: TradePhase,
    pub monitoring: bool,
    pub trade_active: bool,
    pub entry_filled: bool,
    pub tp1_filled: bool,
    pub tp2_filled: bool,
    pub tp3_filled: bool,
    pub breakeven_moved: bool,
    pub trailing_active: bool,
    pub current_orders: usize,
    pub position_size: Option<f64>,
    pub extreme_price: Option<f64>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// Plan, persistence, orders and monitor handle of the one trade.
pub struct TradeDesk {
    pub plan: TradePlan,
    pub orders: OrderCoordinator,
    pub phase: TradePhase,
    store: PlanStore,
    monitor: Option<CancellationToken>,
}

impl TradeDesk {
    pub fn new(plan: TradePlan, store: PlanStore, orders: OrderCoordinator) -> Self {
        Self {
            plan,
            orders,
            phase: TradePhase::Idle,
            store,
            monitor: None,
        }
    }

    pub fn persist(&self) -> Result<(), TradeError> {
        self.store.save(&self.plan).map_err(TradeError::Persist)
    }

    /// Persist from the monitor, where a failed write must not stop supervision.
    pub fn persist_or_log(&self) {
        if let Err(e) = self.persist() {
            error!("{}", e);
        }
    }

    /// Register the token of a freshly spawned monitor.
    pub fn attach_monitor(&mut self, token: CancellationToken) {
        if let Some(previous) = self.monitor.replace(token) {
            previous.cancel();
        }
    }

    pub fn stop_monitor(&mut self) {
        if let Some(token) = self.monitor.take() {
            token.cancel();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    pub fn trade_status(&self) -> TradeStatus {
        let state = &self.plan.state;
        TradeStatus {
            phase: self.phase,
            monitoring: self.is_monitoring(),
            trade_active: state.active,
            entry_filled: state.entry_filled,
            tp1_filled: state.tp_filled[0],
            tp2_filled: state.tp_filled[1],
            tp3_filled: state.tp_filled[2],
            breakeven_moved: state.break_even_applied,
            trailing_active: state.trailing_active,
            current_orders: self.orders.book().len(),
            position_size: state.position_size,
            extreme_price: state.extreme_price,
            opened_at: state.opened_at,
        }
    }
}
