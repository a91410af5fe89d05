// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Inline keyboard layouts.

use super::callbacks::{CallbackAction, Menu};
use crate::plan::{BreakEvenTrigger, Side, TpLevel};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const PAIRS: [&str; 8] = [
    "BTC/USDT", "ETH/USDT", "BNB/USDT", "ADA/USDT", "SOL/USDT", "XRP/USDT", "DOGE/USDT", "DOT/USDT",
];
pub const LEVERAGES: [u32; 8] = [1, 2, 3, 5, 10, 20, 25, 50];
pub const AMOUNTS: [f64; 6] = [10.0, 25.0, 50.0, 100.0, 250.0, 500.0];

fn btn(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), action.encode())
}

fn back(to: Menu) -> Vec<InlineKeyboardButton> {
    vec![btn("🔙 Back", CallbackAction::Show(to))]
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("⚙️ Configuration", CallbackAction::Show(Menu::Config)),
            btn("📊 Trading", CallbackAction::Show(Menu::Trading)),
        ],
        vec![
            btn("🔧 Advanced", CallbackAction::Show(Menu::Advanced)),
            btn("📈 Status", CallbackAction::Status),
        ],
        vec![btn("❓ Help", CallbackAction::Show(Menu::Help))],
    ])
}

pub fn config_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("💱 Trading Pair", CallbackAction::PickPair),
            btn("📈 Side", CallbackAction::PickSide),
        ],
        vec![
            btn("💰 Amount", CallbackAction::PickAmount),
            btn("🎯 Entry Price", CallbackAction::PickEntry),
        ],
        vec![
            btn("⚡ Leverage", CallbackAction::PickLeverage),
            btn("🛡️ Stop Loss", CallbackAction::StopLossHelp),
        ],
        vec![btn("🎯 Take Profits", CallbackAction::Show(Menu::TakeProfits))],
        back(Menu::Main),
    ])
}

/// Place appears only for a valid idle plan, Cancel only while a trade runs.
pub fn trading_menu(can_place: bool, active: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if can_place && !active {
        rows.push(vec![btn("🚀 Place Trade", CallbackAction::Place)]);
    }
    if active {
        rows.push(vec![btn("❌ Cancel Trade", CallbackAction::Cancel)]);
    }
    rows.push(vec![
        btn("📊 Status", CallbackAction::Status),
        btn("🔄 Reset", CallbackAction::Reset),
    ]);
    rows.push(back(Menu::Main));
    InlineKeyboardMarkup::new(rows)
}

pub fn advanced_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("🔄 Dry Run Mode", CallbackAction::PickMode),
            btn("⚖️ Break Even", CallbackAction::PickBreakEven),
        ],
        vec![btn("📉 Trailing Stop", CallbackAction::TrailingHelp)],
        back(Menu::Main),
    ])
}

pub fn take_profit_menu() -> InlineKeyboardMarkup {
    let levels = TpLevel::ALL
        .iter()
        .map(|level| btn(format!("🎯 Set {}", level), CallbackAction::TakeProfitHelp(*level)))
        .collect();
    InlineKeyboardMarkup::new(vec![
        levels,
        vec![btn("🗑️ Clear All TPs", CallbackAction::ClearTakeProfits)],
        back(Menu::Config),
    ])
}

pub fn pair_menu() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = PAIRS
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|pair| btn(*pair, CallbackAction::SelectPair(pair.to_string())))
                .collect()
        })
        .collect();
    rows.push(back(Menu::Config));
    InlineKeyboardMarkup::new(rows)
}

pub fn side_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("📈 LONG", CallbackAction::SelectSide(Side::Long)),
            btn("📉 SHORT", CallbackAction::SelectSide(Side::Short)),
        ],
        back(Menu::Config),
    ])
}

pub fn leverage_menu() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = LEVERAGES
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .map(|leverage| btn(format!("{}x", leverage), CallbackAction::SelectLeverage(*leverage)))
                .collect()
        })
        .collect();
    rows.push(back(Menu::Config));
    InlineKeyboardMarkup::new(rows)
}

pub fn amount_menu() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = AMOUNTS
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|amount| btn(format!("{}", amount), CallbackAction::SelectAmount(*amount)))
                .collect()
        })
        .collect();
    rows.push(back(Menu::Config));
    InlineKeyboardMarkup::new(rows)
}

pub fn entry_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("📊 Market Order", CallbackAction::MarketEntry),
            btn("🎯 Limit Order", CallbackAction::LimitEntryHelp),
        ],
        back(Menu::Config),
    ])
}

pub fn mode_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("🟢 Dry Run ON", CallbackAction::SelectDryRun(true)),
            btn("🔴 Live Trading", CallbackAction::SelectDryRun(false)),
        ],
        back(Menu::Advanced),
    ])
}

pub fn break_even_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("TP1", CallbackAction::SelectBreakEven(BreakEvenTrigger::Tp1)),
            btn("TP2", CallbackAction::SelectBreakEven(BreakEvenTrigger::Tp2)),
            btn("TP3", CallbackAction::SelectBreakEven(BreakEvenTrigger::Tp3)),
        ],
        vec![btn("❌ Disable", CallbackAction::SelectBreakEven(BreakEvenTrigger::None))],
        back(Menu::Advanced),
    ])
}

pub fn after_place_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![btn("📊 View Status", CallbackAction::Status)],
        vec![btn("🏠 Main Menu", CallbackAction::Show(Menu::Main))],
    ])
}

/// Single back button, used under help texts.
pub fn back_to(menu: Menu) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![back(menu)])
}
