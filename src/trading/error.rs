// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::exchange::GatewayError;
use crate::plan::ValidationError;
use thiserror::Error;

/// Failure of a trading command. The display text is what the user sees.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration invalid: {0}")]
    InvalidConfig(ValidationError),
    #[error("Trade already active")]
    AlreadyActive,
    #[error("No active trade to cancel")]
    NoActiveTrade,
    #[error("Cannot change {0} while a trade is active. Cancel it first")]
    LockedWhileActive(&'static str),
    #[error("{context}: {source}")]
    Gateway {
        context: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("Failed to save plan: {0}")]
    Persist(String),
}

impl TradeError {
    /// `map_err` adapter attaching what was being attempted.
    pub fn gateway(context: &'static str) -> impl FnOnce(GatewayError) -> TradeError {
        move |source| TradeError::Gateway { context, source }
    }
}
