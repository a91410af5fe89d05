// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Inline button actions. Callback data is `action` or `action|value`.

use crate::plan::{BreakEvenTrigger, Side, TpLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    Config,
    Trading,
    Advanced,
    TakeProfits,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    Show(Menu),
    PickPair,
    SelectPair(String),
    PickSide,
    SelectSide(Side),
    PickLeverage,
    SelectLeverage(u32),
    PickMode,
    SelectDryRun(bool),
    PickBreakEven,
    SelectBreakEven(BreakEvenTrigger),
    PickAmount,
    SelectAmount(f64),
    PickEntry,
    MarketEntry,
    LimitEntryHelp,
    StopLossHelp,
    TakeProfitHelp(TpLevel),
    TrailingHelp,
    ClearTakeProfits,
    Status,
    Place,
    Cancel,
    Reset,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Show(menu) => match menu {
                Menu::Main => "main_menu",
                Menu::Config => "config_menu",
                Menu::Trading => "trading_menu",
                Menu::Advanced => "advanced_menu",
                Menu::TakeProfits => "set_tp_menu",
                Menu::Help => "help",
            }
            .to_string(),
            CallbackAction::PickPair => "select_pair".to_string(),
            CallbackAction::SelectPair(pair) => format!("select_pair|{}", pair),
            CallbackAction::PickSide => "select_side".to_string(),
            CallbackAction::SelectSide(side) => format!("select_side|{}", side),
            CallbackAction::PickLeverage => "select_leverage".to_string(),
            CallbackAction::SelectLeverage(leverage) => format!("select_leverage|{}", leverage),
            CallbackAction::PickMode => "select_dryrun".to_string(),
            CallbackAction::SelectDryRun(on) => {
                format!("select_dryrun|{}", if *on { "on" } else { "off" })
            }
            CallbackAction::PickBreakEven => "select_breakeven".to_string(),
            CallbackAction::SelectBreakEven(trigger) => format!("select_breakeven|{}", trigger),
            CallbackAction::PickAmount => "set_amount".to_string(),
            CallbackAction::SelectAmount(amount) => format!("set_amount_value|{}", amount),
            CallbackAction::PickEntry => "set_entry".to_string(),
            CallbackAction::MarketEntry => "market_order".to_string(),
            CallbackAction::LimitEntryHelp => "limit_order".to_string(),
            CallbackAction::StopLossHelp => "set_sl".to_string(),
            CallbackAction::TakeProfitHelp(level) => format!("set_tp|{}", level.number()),
            CallbackAction::TrailingHelp => "set_trailing".to_string(),
            CallbackAction::ClearTakeProfits => "clear_all_tp".to_string(),
            CallbackAction::Status => "status".to_string(),
            CallbackAction::Place => "place".to_string(),
            CallbackAction::Cancel => "cancel".to_string(),
            CallbackAction::Reset => "reset".to_string(),
        }
    }

    /// `None` for anything this bot never put on a button.
    pub fn decode(data: &str) -> Option<CallbackAction> {
        let (action, value) = match data.split_once('|') {
            Some((action, value)) => (action, Some(value)),
            None => (data, None),
        };

        let decoded = match (action, value) {
            ("main_menu", None) => CallbackAction::Show(Menu::Main),
            ("config_menu", None) => CallbackAction::Show(Menu::Config),
            ("trading_menu", None) => CallbackAction::Show(Menu::Trading),
            ("advanced_menu", None) => CallbackAction::Show(Menu::Advanced),
            ("set_tp_menu", None) => CallbackAction::Show(Menu::TakeProfits),
            ("help", None) => CallbackAction::Show(Menu::Help),
            ("select_pair", None) => CallbackAction::PickPair,
            ("select_pair", Some(pair)) if !pair.is_empty() => CallbackAction::SelectPair(pair.to_string()),
            ("select_side", None) => CallbackAction::PickSide,
            ("select_side", Some(side)) => CallbackAction::SelectSide(side.parse().ok()?),
            ("select_leverage", None) => CallbackAction::PickLeverage,
            ("select_leverage", Some(leverage)) => CallbackAction::SelectLeverage(leverage.parse().ok()?),
            ("select_dryrun", None) => CallbackAction::PickMode,
            ("select_dryrun", Some("on")) => CallbackAction::SelectDryRun(true),
            ("select_dryrun", Some("off")) => CallbackAction::SelectDryRun(false),
            ("select_breakeven", None) => CallbackAction::PickBreakEven,
            ("select_breakeven", Some(trigger)) => CallbackAction::SelectBreakEven(trigger.parse().ok()?),
            ("set_amount", None) => CallbackAction::PickAmount,
            ("set_amount_value", Some(amount)) => {
                CallbackAction::SelectAmount(amount.parse().ok().filter(|a: &f64| a.is_finite())?)
            }
            ("set_entry", None) => CallbackAction::PickEntry,
            ("market_order", None) => CallbackAction::MarketEntry,
            ("limit_order", None) => CallbackAction::LimitEntryHelp,
            ("set_sl", None) => CallbackAction::StopLossHelp,
            ("set_tp", Some(level)) => CallbackAction::TakeProfitHelp(TpLevel::new(level.parse().ok()?).ok()?),
            ("set_trailing", None) => CallbackAction::TrailingHelp,
            ("clear_all_tp", None) => CallbackAction::ClearTakeProfits,
            ("status", None) => CallbackAction::Status,
            ("place", None) => CallbackAction::Place,
            ("cancel", None) => CallbackAction::Cancel,
            ("reset", None) => CallbackAction::Reset,
            _ => return None,
        };
        Some(decoded)
    }
}
