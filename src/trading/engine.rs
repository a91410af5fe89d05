// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trading commands shared by every front-end.

use super::desk::{TradeDesk, TradePhase, TradeStatus};
use super::events::EventSender;
use super::monitor;
use super::TradeError;
use crate::exchange::{Balance, PositionInfo};
use crate::plan::{BreakEvenTrigger, Side, TradePlan, ValidationError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Handle to the trade desk. Cheap to clone; every command runs under the desk lock.
#[derive(Clone)]
pub struct TradeEngine {
    desk: Arc<Mutex<TradeDesk>>,
    events: EventSender,
    poll_interval: Duration,
}

impl TradeEngine {
    pub fn new(mut desk: TradeDesk, events: EventSender, poll_interval: Duration) -> Self {
        resume_after_restart(&mut desk);
        Self {
            desk: Arc::new(Mutex::new(desk)),
            events,
            poll_interval,
        }
    }

    /// Validate, submit the entry and start supervising.
    pub async fn place_trade(&self) -> Result<String, TradeError> {
        let mut guard = self.desk.lock().await;
        let desk = &mut *guard;

        desk.plan.is_valid_for_trading().map_err(TradeError::InvalidConfig)?;
        if desk.plan.state.active {
            return Err(TradeError::AlreadyActive);
        }

        desk.phase = TradePhase::Submitting;
        desk.plan.reset_execution_state();

        if !desk.plan.dry_run {
            if let Some(instrument) = desk.plan.instrument.clone() {
                if let Err(e) = desk.orders.gateway().set_leverage(&instrument, desk.plan.leverage).await {
                    warn!("Failed to set leverage {}x: {}", desk.plan.leverage, e);
                }
            }
        }

        desk.plan.state.active = true;
        desk.plan.state.opened_at = Some(Utc::now());
        if let Err(e) = desk.orders.submit_entry(&mut desk.plan).await {
            error!("Trade submission failed: {}", e);
            desk.plan.reset_execution_state();
            desk.phase = TradePhase::Idle;
            desk.persist_or_log();
            return Err(e);
        }

        desk.phase = TradePhase::AwaitingEntry;
        desk.persist_or_log();

        let token = CancellationToken::new();
        desk.attach_monitor(token.clone());
        monitor::spawn_monitor(self.desk.clone(), token, self.poll_interval, self.events.clone());

        let mode = if desk.plan.dry_run { "DRY RUN" } else { "LIVE" };
        info!(
            "🚀 Trade placed: {} {} {} @ {} ({})",
            desk.plan.side.map(|s| s.to_string()).unwrap_or_default(),
            desk.plan.amount.unwrap_or_default(),
            desk.plan.instrument.as_deref().unwrap_or_default(),
            desk.plan.entry_price.unwrap_or_default(),
            mode
        );
        Ok(format!("Trade placed successfully in {} mode", mode))
    }

    /// Stop supervision, cancel every tracked order and clear execution state.
    pub async fn cancel_trade(&self) -> Result<String, TradeError> {
        let mut desk = self.desk.lock().await;
        let failed = cancel_active(&mut desk).await?;
        desk.persist()?;

        if failed > 0 {
            Ok(format!("Trade cancelled ({} order(s) could not be cancelled)", failed))
        } else {
            Ok("Trade cancelled".to_string())
        }
    }

    /// Back to default configuration. An active trade is canceled first.
    pub async fn reset_plan(&self) -> Result<String, TradeError> {
        let mut desk = self.desk.lock().await;
        if desk.plan.state.active {
            cancel_active(&mut desk).await?;
        }
        desk.plan.reset();
        desk.phase = TradePhase::Idle;
        desk.persist()?;
        info!("🔄 Plan reset to defaults");
        Ok("Configuration reset to defaults".to_string())
    }

    pub async fn set_pair(&self, pair: &str) -> Result<String, TradeError> {
        self.update("pair", true, |plan| {
            plan.set_pair(pair)?;
            Ok(format!(
                "Trading pair set to: {}",
                plan.instrument.as_deref().unwrap_or_default()
            ))
        })
        .await
    }

    pub async fn set_side(&self, side: Side) -> Result<String, TradeError> {
        self.update("side", true, |plan| {
            plan.set_side(side);
            Ok(format!("Trade side set to: {}", side.to_string().to_uppercase()))
        })
        .await
    }

    pub async fn set_amount(&self, amount: f64) -> Result<String, TradeError> {
        self.update("amount", true, |plan| {
            plan.set_amount(amount)?;
            Ok(format!("Position size set to: {}", amount))
        })
        .await
    }

    pub async fn set_entry(&self, price: f64) -> Result<String, TradeError> {
        self.update("entry", true, |plan| {
            plan.set_entry(price)?;
            Ok(if plan.is_market_entry() {
                "Entry set to Market Order".to_string()
            } else {
                format!("Entry price set to: {}", price)
            })
        })
        .await
    }

    pub async fn set_leverage(&self, leverage: u32) -> Result<String, TradeError> {
        self.update("leverage", true, |plan| {
            plan.set_leverage(leverage)?;
            Ok(format!("Leverage set to: {}x", leverage))
        })
        .await
    }

    pub async fn set_stop_loss(&self, price: f64) -> Result<String, TradeError> {
        self.update("stop loss", true, |plan| {
            plan.set_stop_loss(price)?;
            Ok(format!("Stop loss set to: {}", price))
        })
        .await
    }

    pub async fn set_take_profit(&self, level: u8, price: f64, percent: f64) -> Result<String, TradeError> {
        self.update("take profits", true, |plan| {
            plan.set_take_profit(level, price, percent)?;
            Ok(format!("TP{} set to: {} ({}%)", level, price, percent))
        })
        .await
    }

    pub async fn clear_take_profits(&self) -> Result<String, TradeError> {
        self.update("take profits", true, |plan| {
            plan.clear_take_profits();
            Ok("All take profits cleared".to_string())
        })
        .await
    }

    pub async fn set_dry_run(&self, enabled: bool) -> Result<String, TradeError> {
        self.update("trading mode", true, |plan| {
            plan.set_dry_run(enabled);
            Ok(if enabled {
                "Dry run mode enabled".to_string()
            } else {
                "Live trading mode enabled".to_string()
            })
        })
        .await
    }

    /// Risk settings stay editable during a trade; the monitor reads them every tick.
    pub async fn set_break_even(&self, trigger: BreakEvenTrigger) -> Result<String, TradeError> {
        self.update("break-even", false, |plan| {
            plan.set_break_even(trigger);
            Ok(match trigger.level() {
                Some(level) => format!("Break-even trigger set to: {}", level),
                None => "Break-even disabled".to_string(),
            })
        })
        .await
    }

    pub async fn set_trailing_stop(&self, percent: f64) -> Result<String, TradeError> {
        self.update("trailing stop", false, |plan| {
            plan.set_trailing_stop(percent)?;
            Ok(format!("Trailing stop set to: {}%", percent))
        })
        .await
    }

    pub async fn disable_trailing_stop(&self) -> Result<String, TradeError> {
        self.update("trailing stop", false, |plan| {
            plan.disable_trailing_stop();
            Ok("Trailing stop disabled".to_string())
        })
        .await
    }

    pub async fn config_snapshot(&self) -> TradePlan {
        self.desk.lock().await.plan.clone()
    }

    pub async fn trade_status(&self) -> TradeStatus {
        self.desk.lock().await.trade_status()
    }

    /// Plan and status read under one lock.
    pub async fn snapshot(&self) -> (TradePlan, TradeStatus) {
        let desk = self.desk.lock().await;
        (desk.plan.clone(), desk.trade_status())
    }

    pub async fn balances(&self) -> Result<Vec<Balance>, TradeError> {
        let gateway = self.desk.lock().await.orders.gateway().clone();
        gateway
            .get_balance()
            .await
            .map_err(TradeError::gateway("Failed to fetch balance"))
    }

    pub async fn positions(&self) -> Result<Vec<PositionInfo>, TradeError> {
        let (gateway, instrument) = {
            let desk = self.desk.lock().await;
            (desk.orders.gateway().clone(), desk.plan.instrument.clone())
        };
        gateway
            .get_positions(instrument.as_deref())
            .await
            .map_err(TradeError::gateway("Failed to fetch positions"))
    }

    /// Stop supervision at shutdown. Execution state stays on disk.
    pub async fn shutdown(&self) {
        let mut desk = self.desk.lock().await;
        if desk.is_monitoring() {
            warn!("⚠️ Stopping monitor with an active trade; protective orders stay on the exchange");
        }
        desk.stop_monitor();
    }

    /// Apply one validated mutation and persist it.
    async fn update<F>(&self, what: &'static str, locked_while_active: bool, apply: F) -> Result<String, TradeError>
    where
        F: FnOnce(&mut TradePlan) -> Result<String, ValidationError>,
    {
        let mut desk = self.desk.lock().await;
        if locked_while_active && desk.plan.state.active {
            return Err(TradeError::LockedWhileActive(what));
        }

        let message = apply(&mut desk.plan)?;
        desk.persist()?;
        info!("⚙️ {}", message);
        Ok(message)
    }
}

/// Returns the number of orders whose cancel failed.
async fn cancel_active(desk: &mut TradeDesk) -> Result<usize, TradeError> {
    if !desk.plan.state.active {
        return Err(TradeError::NoActiveTrade);
    }

    desk.stop_monitor();
    let report = desk.orders.cancel_all(&mut desk.plan).await;
    desk.phase = TradePhase::Canceled;
    info!(
        "🛑 Trade cancelled ({} order(s) cancelled, {} failed)",
        report.cancelled, report.failed
    );
    Ok(report.failed)
}

/// Venue handles are not persisted, so a trade that was active when the
/// process stopped cannot be supervised again.
fn resume_after_restart(desk: &mut TradeDesk) {
    if desk.plan.state.active {
        warn!("⚠️ Plan was saved with an active trade; clearing stale execution state. Check the exchange for open orders.");
        desk.plan.reset_execution_state();
        desk.persist_or_log();
    }
}
