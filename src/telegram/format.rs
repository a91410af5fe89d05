// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message texts and small numeric helpers.

use crate::exchange::{Balance, PositionInfo};
use crate::plan::{Side, TpLevel, TradePlan};
use crate::trading::{TradeError, TradeStatus};
use std::fmt::Write;

const NOT_SET: &str = "Not set";

pub fn format_price(price: Option<f64>, decimals: usize) -> String {
    match price {
        Some(p) => format!("{:.*}", decimals, p),
        None => "N/A".to_string(),
    }
}

pub fn format_percentage(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{:.1}%", p),
        None => "N/A".to_string(),
    }
}

/// Signed move from `entry` to `exit` in percent, positive when in profit.
pub fn profit_percentage(entry: f64, exit: f64, side: Side) -> f64 {
    if entry == 0.0 {
        return 0.0;
    }
    match side {
        Side::Long => (exit - entry) / entry * 100.0,
        Side::Short => (entry - exit) / entry * 100.0,
    }
}

/// Reward per unit of risk. 0 when the stop is not on the losing side of entry.
pub fn risk_reward(entry: f64, take_profit: f64, stop_loss: f64, side: Side) -> f64 {
    let (reward, risk) = match side {
        Side::Long => (take_profit - entry, entry - stop_loss),
        Side::Short => (entry - take_profit, stop_loss - entry),
    };
    if risk <= 0.0 {
        return 0.0;
    }
    reward / risk
}

fn or_not_set(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| NOT_SET.to_string())
}

fn side_label(plan: &TradePlan) -> String {
    plan.side
        .map(|s| s.to_string().to_uppercase())
        .unwrap_or_else(|| NOT_SET.to_string())
}

fn entry_label(plan: &TradePlan) -> String {
    match plan.entry_price {
        Some(p) if p == 0.0 && !plan.state.active => "Market".to_string(),
        other => or_not_set(other),
    }
}

fn mode_label(plan: &TradePlan) -> &'static str {
    if plan.dry_run {
        "DRY RUN"
    } else {
        "LIVE"
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// One-glance summary of the configured plan.
pub fn trade_summary(plan: &TradePlan) -> String {
    let Some(instrument) = plan.instrument.as_deref() else {
        return "No active configuration".to_string();
    };

    let mut text = format!(
        "📊 {} {}\n",
        instrument,
        plan.side.map(|s| s.to_string().to_uppercase()).unwrap_or_else(|| "N/A".to_string())
    );
    let _ = writeln!(
        text,
        "💰 Size: {}",
        plan.amount.map(|a| a.to_string()).unwrap_or_else(|| "N/A".to_string())
    );
    let _ = writeln!(text, "🎯 Entry: {}", format_price(plan.entry_price, 2));
    let _ = writeln!(text, "🛑 SL: {}", format_price(plan.stop_loss, 2));
    for (level, tp) in plan.configured_take_profits() {
        let _ = writeln!(
            text,
            "🎯 {}: {} ({})",
            level,
            format_price(Some(tp.price), 2),
            format_percentage(Some(tp.percent))
        );
    }
    let _ = writeln!(text, "⚡ Leverage: {}x", plan.leverage);
    let _ = write!(text, "🧪 Mode: {}", mode_label(plan));
    text
}

pub fn main_menu_text() -> String {
    "🤖 Welcome to the Futures Trade Plan Bot!\n\n\
     This bot manages one USDT-M futures position with:\n\
     • Partial take profits (TP1, TP2, TP3)\n\
     • Break-even stop loss\n\
     • Trailing stop\n\
     • Dry-run mode for testing\n\n\
     Choose an option below:"
        .to_string()
}

pub fn help_text() -> String {
    "📋 Trading Bot Commands\n\n\
     Configuration:\n\
     /set_pair BTC/USDT - trading pair\n\
     /set_side long|short - direction\n\
     /set_amount 100 - position size\n\
     /set_entry 45000 - limit entry (0 = market)\n\
     /set_leverage 10 - leverage 1-100\n\
     /set_sl 42000 - stop loss\n\
     /set_tp1 50000 30 - take profit price and % of remaining size\n\
     /clear_tp - remove all take profits\n\n\
     Advanced:\n\
     /set_dryrun on|off - simulate or trade live\n\
     /set_breakeven tp1|tp2|tp3|none - move SL to entry after a TP\n\
     /set_trailstop 2.5|off - trailing stop distance in %\n\n\
     Trading:\n\
     /place - place the configured trade\n\
     /status - configuration and trade progress\n\
     /cancel - cancel the active trade\n\
     /reset - back to defaults\n\
     /balance - account balances\n\
     /positions - open venue positions\n\
     /menu - interactive menu"
        .to_string()
}

pub fn config_text(plan: &TradePlan) -> String {
    format!(
        "⚙️ Configuration Menu\n\n\
         📈 Pair: {}\n\
         📊 Side: {}\n\
         💰 Amount: {}\n\
         🎯 Entry: {}\n\
         ⚡ Leverage: {}x\n\
         🛑 Stop Loss: {}\n\n\
         Choose what to configure:",
        plan.instrument.as_deref().unwrap_or(NOT_SET),
        side_label(plan),
        or_not_set(plan.amount),
        entry_label(plan),
        plan.leverage,
        or_not_set(plan.stop_loss),
    )
}

pub fn trading_text(plan: &TradePlan, status: &TradeStatus) -> String {
    let mut text = format!(
        "📊 Trading Menu\n\nStatus: {}\nMode: {}\n\n",
        if status.trade_active { "🟢 Active" } else { "🔴 Inactive" },
        if plan.dry_run { "🧪 DRY RUN" } else { "🔴 LIVE" },
    );
    match plan.is_valid_for_trading() {
        Ok(()) => text.push_str("✅ Configuration is valid for trading\n"),
        Err(reason) => {
            let _ = writeln!(text, "❌ {}", reason);
        }
    }
    text.push_str("\nChoose an action:");
    text
}

pub fn advanced_text(plan: &TradePlan) -> String {
    let break_even = match plan.break_even.level() {
        Some(level) => level.to_string(),
        None => "Disabled".to_string(),
    };
    let trailing = match plan.trailing_stop_percent {
        Some(p) => format!("{}%", p),
        None => "Disabled".to_string(),
    };
    format!(
        "⚡ Advanced Settings\n\n🧪 Mode: {}\n🔄 Break-even: {}\n📈 Trailing Stop: {}",
        mode_label(plan),
        break_even,
        trailing
    )
}

pub fn take_profit_text(plan: &TradePlan) -> String {
    let mut text = "🎯 Take Profit Configuration\n\n".to_string();
    for level in TpLevel::ALL {
        match plan.take_profit(level) {
            Some(tp) => {
                let _ = writeln!(text, "{}: {} ({}%)", level, tp.price, tp.percent);
            }
            None => {
                let _ = writeln!(text, "{}: {} (0%)", level, NOT_SET);
            }
        }
    }
    let _ = write!(
        text,
        "\nSizes apply to the position remaining when each TP fills ({}% configured).",
        plan.total_take_profit_percent()
    );
    text
}

/// Full `/status` report: configuration first, then trade progress.
pub fn status_text(plan: &TradePlan, status: &TradeStatus) -> String {
    let mut text = "📊 Trading Bot Status\n\n".to_string();

    let _ = writeln!(text, "📈 Pair: {}", plan.instrument.as_deref().unwrap_or(NOT_SET));
    let _ = writeln!(text, "📊 Side: {}", side_label(plan));
    let _ = writeln!(text, "💰 Amount: {}", or_not_set(plan.amount));
    let _ = writeln!(text, "🎯 Entry: {}", entry_label(plan));
    let _ = writeln!(text, "⚡ Leverage: {}x", plan.leverage);
    let _ = writeln!(text, "🛑 Stop Loss: {}", or_not_set(plan.stop_loss));

    let entry = plan.entry_price.filter(|p| *p > 0.0);
    for (level, tp) in plan.configured_take_profits() {
        let _ = write!(text, "🎯 {}: {} ({}%)", level, tp.price, tp.percent);
        if let (Some(entry), Some(side)) = (entry, plan.side) {
            let _ = write!(text, " {:+.1}%", profit_percentage(entry, tp.price, side));
            if let Some(stop) = plan.stop_loss {
                let ratio = risk_reward(entry, tp.price, stop, side);
                if ratio > 0.0 {
                    let _ = write!(text, " R:R {:.2}", ratio);
                }
            }
        }
        text.push('\n');
    }

    let _ = writeln!(text, "\n🧪 Mode: {}", mode_label(plan));
    let _ = writeln!(text, "🔄 Trade Active: {}", yes_no(status.trade_active));

    if status.trade_active {
        let _ = writeln!(text, "📍 Phase: {}", status.phase);
        let _ = writeln!(text, "✅ Entry Filled: {}", yes_no(status.entry_filled));
        let filled = [status.tp1_filled, status.tp2_filled, status.tp3_filled];
        for (level, _) in plan.configured_take_profits() {
            let _ = writeln!(
                text,
                "🎯 {} Filled: {}",
                level,
                yes_no(filled[usize::from(level.number() - 1)])
            );
        }
        if let Some(size) = status.position_size {
            let _ = writeln!(text, "📦 Position: {}", size);
        }
        if status.breakeven_moved {
            text.push_str("🔄 Stop moved to break-even\n");
        }
        if status.trailing_active {
            let _ = writeln!(text, "📈 Trailing from: {}", format_price(status.extreme_price, 4));
        }
        let _ = writeln!(text, "📋 Open orders: {}", status.current_orders);
    }

    text
}

pub fn balances_text(balances: &[Balance]) -> String {
    if balances.is_empty() {
        return "💰 No balances".to_string();
    }
    let mut text = "💰 Balances\n\n".to_string();
    for balance in balances {
        let _ = writeln!(
            text,
            "{}: {} (free {})",
            balance.asset,
            format_price(Some(balance.total), 2),
            format_price(Some(balance.free), 2)
        );
    }
    text
}

pub fn positions_text(positions: &[PositionInfo]) -> String {
    let open: Vec<&PositionInfo> = positions.iter().filter(|p| p.size != 0.0).collect();
    if open.is_empty() {
        return "📈 No open positions".to_string();
    }
    let mut text = "📈 Open Positions\n\n".to_string();
    for position in open {
        let _ = writeln!(
            text,
            "{} {} {} @ {} ({}x) PnL {}",
            position.instrument,
            if position.size > 0.0 { "LONG" } else { "SHORT" },
            position.size.abs(),
            format_price(Some(position.entry_price), 4),
            position.leverage,
            format_price(Some(position.unrealized_pnl), 2)
        );
    }
    text
}

/// Placement outcome, followed by the plan summary on success.
pub fn placed(result: Result<String, TradeError>, plan: &TradePlan) -> String {
    match result {
        Ok(message) => format!("✅ {}\n\n{}", message, trade_summary(plan)),
        Err(e) => format!("❌ {}", e),
    }
}

/// Outcome of an engine command as a chat line.
pub fn reply(result: Result<String, TradeError>) -> String {
    match result {
        Ok(message) => format!("✅ {}", message),
        Err(e) => format!("❌ {}", e),
    }
}
