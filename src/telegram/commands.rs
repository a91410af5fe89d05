// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Text commands, decoded once from the raw message.

use crate::plan::{BreakEvenTrigger, Side};

pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see available commands.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Menu,
    SetPair(String),
    SetSide(Side),
    SetAmount(f64),
    SetEntry(f64),
    SetTakeProfit { level: u8, price: f64, percent: f64 },
    ClearTakeProfits,
    SetStopLoss(f64),
    SetLeverage(u32),
    SetDryRun(bool),
    SetBreakEven(BreakEvenTrigger),
    /// `None` disables trailing.
    SetTrailingStop(Option<f64>),
    Place,
    Status,
    Cancel,
    Reset,
    Balance,
    Positions,
}

impl Command {
    /// Parse `/name args...`. The error is the reply to send back
    /// (usage text or a format complaint).
    pub fn parse(text: &str) -> Result<Command, String> {
        let mut parts = text.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(UNKNOWN_COMMAND.to_string());
        };
        let args: Vec<&str> = parts.collect();

        // "/status@my_bot" in group chats
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        match name.as_str() {
            "/start" => Ok(Command::Start),
            "/help" => Ok(Command::Help),
            "/menu" => Ok(Command::Menu),
            "/place" => Ok(Command::Place),
            "/status" => Ok(Command::Status),
            "/cancel" => Ok(Command::Cancel),
            "/reset" => Ok(Command::Reset),
            "/balance" => Ok(Command::Balance),
            "/positions" => Ok(Command::Positions),
            "/clear_tp" => Ok(Command::ClearTakeProfits),
            "/set_pair" => {
                let pair = first(&args, "Usage: /set_pair <symbol>\nExample: /set_pair BTC/USDT")?;
                Ok(Command::SetPair(pair.to_string()))
            }
            "/set_side" => {
                let side = first(&args, "Usage: /set_side <long|short>\nExample: /set_side long")?;
                side.parse()
                    .map(Command::SetSide)
                    .map_err(|_| "❌ Invalid side. Use 'long' or 'short'".to_string())
            }
            "/set_amount" => {
                let amount = first(&args, "Usage: /set_amount <amount>\nExample: /set_amount 100")?;
                number(amount, "❌ Invalid amount format").map(Command::SetAmount)
            }
            "/set_entry" => {
                let price = first(
                    &args,
                    "Usage: /set_entry <price>\nExample: /set_entry 45000 or /set_entry 0 for market order",
                )?;
                number(price, "❌ Invalid price format").map(Command::SetEntry)
            }
            "/set_tp1" | "/set_tp2" | "/set_tp3" => {
                let level = if name.ends_with('1') {
                    1
                } else if name.ends_with('2') {
                    2
                } else {
                    3
                };
                let [price, percent] = args.as_slice() else {
                    return Err(format!(
                        "Usage: /set_tp{level} <price> <percentage>\nExample: /set_tp{level} 50000 30"
                    ));
                };
                Ok(Command::SetTakeProfit {
                    level,
                    price: number(price, "❌ Invalid format")?,
                    percent: number(percent, "❌ Invalid format")?,
                })
            }
            "/set_sl" => {
                let price = first(&args, "Usage: /set_sl <price>\nExample: /set_sl 42000")?;
                number(price, "❌ Invalid price format").map(Command::SetStopLoss)
            }
            "/set_leverage" => {
                let leverage = first(&args, "Usage: /set_leverage <1-100>\nExample: /set_leverage 10")?;
                leverage
                    .parse()
                    .map(Command::SetLeverage)
                    .map_err(|_| "❌ Invalid leverage format".to_string())
            }
            "/set_dryrun" => {
                let mode = first(&args, "Usage: /set_dryrun <on|off>\nExample: /set_dryrun on")?;
                match mode.to_lowercase().as_str() {
                    "on" | "true" | "1" => Ok(Command::SetDryRun(true)),
                    "off" | "false" | "0" => Ok(Command::SetDryRun(false)),
                    _ => Err("❌ Invalid mode. Use 'on' or 'off'".to_string()),
                }
            }
            "/set_breakeven" => {
                let trigger = first(
                    &args,
                    "Usage: /set_breakeven <tp1|tp2|tp3|none>\nExample: /set_breakeven tp1",
                )?;
                trigger
                    .parse()
                    .map(Command::SetBreakEven)
                    .map_err(|e: crate::plan::ValidationError| format!("❌ {}", e))
            }
            "/set_trailstop" => {
                let percent = first(
                    &args,
                    "Usage: /set_trailstop <percentage|off>\nExample: /set_trailstop 2.5",
                )?;
                if percent.eq_ignore_ascii_case("off") {
                    return Ok(Command::SetTrailingStop(None));
                }
                number(percent, "❌ Invalid percentage format").map(|p| Command::SetTrailingStop(Some(p)))
            }
            _ => Err(UNKNOWN_COMMAND.to_string()),
        }
    }
}

fn first<'a>(args: &[&'a str], usage: &str) -> Result<&'a str, String> {
    args.first().copied().ok_or_else(|| usage.to_string())
}

fn number(raw: &str, complaint: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| complaint.to_string())
}
