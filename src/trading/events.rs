// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Notifications emitted by the position monitor.

use super::orders::OrderSlot;
use super::risk::StopReason;
use crate::plan::TpLevel;
use tokio::sync::mpsc;

pub type EventSender = mpsc::Sender<TradeEvent>;
pub type EventReceiver = mpsc::Receiver<TradeEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    StopLoss,
    TakeProfits,
    PositionFlat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    EntryFilled {
        instrument: String,
        price: f64,
        size: f64,
    },
    TakeProfitFilled {
        level: TpLevel,
        price: f64,
        remaining: f64,
    },
    StopMoved {
        price: f64,
        reason: StopReason,
    },
    ProtectiveOrderFailed {
        slot: OrderSlot,
        error: String,
    },
    Closed {
        instrument: String,
        reason: CloseReason,
    },
    Aborted {
        reason: String,
    },
}

impl TradeEvent {
    /// Chat-ready text.
    pub fn message(&self) -> String {
        match self {
            TradeEvent::EntryFilled { instrument, price, size } => {
                format!("✅ Entry filled: {} {} @ {}", size, instrument, price)
            }
            TradeEvent::TakeProfitFilled { level, price, remaining } => {
                format!("🎯 {} filled @ {} (remaining size {})", level, price, remaining)
            }
            TradeEvent::StopMoved { price, reason } => {
                format!("🛡️ Stop loss moved to {} ({})", price, reason)
            }
            TradeEvent::ProtectiveOrderFailed { slot, error } => {
                format!("⚠️ Failed to place {} order: {}", slot, error)
            }
            TradeEvent::Closed { instrument, reason } => {
                let why = match reason {
                    CloseReason::StopLoss => "stop loss hit",
                    CloseReason::TakeProfits => "all take profits filled",
                    CloseReason::PositionFlat => "position fully closed",
                };
                format!("🏁 Trade on {} closed: {}", instrument, why)
            }
            TradeEvent::Aborted { reason } => format!("❌ Trade aborted: {}", reason),
        }
    }
}

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}
