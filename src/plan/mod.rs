// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade plan record and its persistence.

pub mod store;
pub mod trade_plan;

pub use store::{PlanStore, DEFAULT_PLAN_FILE};
pub use trade_plan::{
    BreakEvenTrigger, ExecutionState, OrderSide, Side, TakeProfit, TpLevel, TradePlan, ValidationError,
};
