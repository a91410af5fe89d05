// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Stop-loss management decisions. Pure functions of the plan and the last price.

use crate::plan::{Side, TradePlan};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BreakEven,
    Trailing,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::BreakEven => write!(f, "break-even"),
            StopReason::Trailing => write!(f, "trailing stop"),
        }
    }
}

/// Instruction to move the stop-loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopMove {
    pub price: f64,
    pub reason: StopReason,
}

/// Result of a trailing evaluation: the extreme to store and an optional stop move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingUpdate {
    pub extreme: f64,
    pub stop_move: Option<StopMove>,
}

/// Move the stop to entry once the trigger level has filled.
///
/// Returns nothing once applied, and nothing when the current stop already
/// sits at or beyond entry (moving it would loosen protection).
pub fn break_even_decision(plan: &TradePlan) -> Option<StopMove> {
    if plan.state.break_even_applied {
        return None;
    }
    let level = plan.break_even.level()?;
    if !plan.tp_filled(level) {
        return None;
    }
    let side = plan.side?;
    let entry = plan.entry_price.filter(|p| *p > 0.0)?;

    match plan.stop_loss {
        Some(stop) if !side.is_more_favorable(entry, stop) => None,
        _ => Some(StopMove {
            price: entry,
            reason: StopReason::BreakEven,
        }),
    }
}

/// Follow the most favorable price by the configured percentage.
///
/// `None` while trailing is disabled or not yet seeded by a take-profit fill.
pub fn trailing_decision(plan: &TradePlan, price: f64) -> Option<TrailingUpdate> {
    let percent = plan.trailing_stop_percent?;
    if !plan.state.trailing_active {
        return None;
    }
    let side = plan.side?;

    let extreme = match plan.state.extreme_price {
        Some(extreme) if !side.is_more_favorable(price, extreme) => extreme,
        _ => price,
    };
    let candidate = match side {
        Side::Long => extreme * (1.0 - percent / 100.0),
        Side::Short => extreme * (1.0 + percent / 100.0),
    };

    let tightens = plan
        .stop_loss
        .map_or(true, |stop| side.is_more_favorable(candidate, stop));

    Some(TrailingUpdate {
        extreme,
        stop_move: tightens.then_some(StopMove {
            price: candidate,
            reason: StopReason::Trailing,
        }),
    })
}
