// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade plan record - user parameters plus execution state of the single trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_LEVERAGE: u32 = 1;
pub const MAX_LEVERAGE: u32 = 100;
pub const MAX_TRAILING_PERCENT: f64 = 50.0;
const DEFAULT_QUOTE: &str = "USDT";

/// Rejected plan mutation or trade submission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid pair format. Use format like BTC/USDT")]
    InvalidPair,
    #[error("Invalid side. Use 'long' or 'short'")]
    InvalidSide,
    #[error("Invalid amount. Must be greater than 0")]
    InvalidAmount,
    #[error("Invalid entry price. Use 0 for market or a positive price")]
    InvalidEntry,
    #[error("Invalid leverage. Must be between 1-100")]
    InvalidLeverage,
    #[error("Invalid stop loss price")]
    InvalidStopLoss,
    #[error("Invalid take profit level. Use 1, 2 or 3")]
    InvalidTpLevel,
    #[error("Invalid TP settings. Price must be > 0 and percent within (0, 100]")]
    InvalidTakeProfit,
    #[error("Invalid trigger. Use tp1, tp2, tp3, or none")]
    InvalidBreakEven,
    #[error("Invalid percentage. Must be within (0, 50]")]
    InvalidTrailingStop,
    #[error("{0}")]
    NotReady(&'static str),
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Order side that opens a position in this direction.
    pub fn entry_order_side(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order side that reduces a position in this direction.
    pub fn exit_order_side(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }

    /// True when `candidate` is strictly better for this side than `reference`.
    pub fn is_more_favorable(self, candidate: f64, reference: f64) -> bool {
        match self {
            Side::Long => candidate > reference,
            Side::Short => candidate < reference,
        }
    }

    /// True when `price` has reached `target` in the profitable direction.
    pub fn reached_target(self, price: f64, target: f64) -> bool {
        match self {
            Side::Long => price >= target,
            Side::Short => price <= target,
        }
    }

    /// True when `price` has reached `stop` in the losing direction.
    pub fn reached_stop(self, price: f64, stop: f64) -> bool {
        match self {
            Side::Long => price <= stop,
            Side::Short => price >= stop,
        }
    }

    /// True when a resting limit entry at `entry` would have filled at `price`.
    pub fn entry_crossed(self, price: f64, entry: f64) -> bool {
        match self {
            Side::Long => price <= entry,
            Side::Short => price >= entry,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            _ => Err(ValidationError::InvalidSide),
        }
    }
}

/// Venue order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Take-profit level index (1, 2 or 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TpLevel(u8);

impl TpLevel {
    pub const ALL: [TpLevel; 3] = [TpLevel(1), TpLevel(2), TpLevel(3)];

    pub fn new(level: u8) -> Result<Self, ValidationError> {
        match level {
            1..=3 => Ok(Self(level)),
            _ => Err(ValidationError::InvalidTpLevel),
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for TpLevel {
    type Error = ValidationError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<TpLevel> for u8 {
    fn from(level: TpLevel) -> Self {
        level.0
    }
}

impl fmt::Display for TpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TP{}", self.0)
    }
}

/// Partial exit target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    pub price: f64,
    /// Share of the position remaining at fill time, in percent.
    pub percent: f64,
}

/// Take-profit level whose fill moves the stop-loss to entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakEvenTrigger {
    #[default]
    None,
    Tp1,
    Tp2,
    Tp3,
}

impl BreakEvenTrigger {
    pub fn level(self) -> Option<TpLevel> {
        match self {
            BreakEvenTrigger::None => None,
            BreakEvenTrigger::Tp1 => Some(TpLevel(1)),
            BreakEvenTrigger::Tp2 => Some(TpLevel(2)),
            BreakEvenTrigger::Tp3 => Some(TpLevel(3)),
        }
    }
}

impl fmt::Display for BreakEvenTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level() {
            Some(level) => write!(f, "{}", level),
            None => write!(f, "none"),
        }
    }
}

impl FromStr for BreakEvenTrigger {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(BreakEvenTrigger::None),
            "tp1" => Ok(BreakEvenTrigger::Tp1),
            "tp2" => Ok(BreakEvenTrigger::Tp2),
            "tp3" => Ok(BreakEvenTrigger::Tp3),
            _ => Err(ValidationError::InvalidBreakEven),
        }
    }
}

/// Execution state. Only meaningful while `active` is true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionState {
    pub active: bool,
    pub position_size: Option<f64>,
    pub entry_filled: bool,
    pub tp_filled: [bool; 3],
    pub break_even_applied: bool,
    pub trailing_active: bool,
    /// Highest price seen for longs, lowest for shorts.
    pub extreme_price: Option<f64>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// The single trade plan of this deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradePlan {
    pub instrument: Option<String>,
    pub side: Option<Side>,
    pub amount: Option<f64>,
    /// 0 means "use the market price at submission".
    pub entry_price: Option<f64>,
    pub leverage: u32,
    pub stop_loss: Option<f64>,
    pub take_profits: [Option<TakeProfit>; 3],
    pub break_even: BreakEvenTrigger,
    pub trailing_stop_percent: Option<f64>,
    pub dry_run: bool,
    #[serde(flatten)]
    pub state: ExecutionState,
}

impl Default for TradePlan {
    fn default() -> Self {
        Self {
            instrument: None,
            side: None,
            amount: None,
            entry_price: None,
            leverage: MIN_LEVERAGE,
            stop_loss: None,
            take_profits: [None; 3],
            break_even: BreakEvenTrigger::None,
            trailing_stop_percent: None,
            // Safe default: nothing reaches the venue until explicitly enabled.
            dry_run: true,
            state: ExecutionState::default(),
        }
    }
}

impl TradePlan {
    /// Set the instrument, normalised to `BASE/QUOTE`.
    pub fn set_pair(&mut self, pair: &str) -> Result<(), ValidationError> {
        self.instrument = Some(normalize_pair(pair)?);
        Ok(())
    }

    pub fn set_side(&mut self, side: Side) {
        self.side = Some(side);
    }

    pub fn set_amount(&mut self, amount: f64) -> Result<(), ValidationError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ValidationError::InvalidAmount);
        }
        self.amount = Some(amount);
        Ok(())
    }

    pub fn set_entry(&mut self, price: f64) -> Result<(), ValidationError> {
        if !price.is_finite() || price < 0.0 {
            return Err(ValidationError::InvalidEntry);
        }
        self.entry_price = Some(price);
        Ok(())
    }

    pub fn set_leverage(&mut self, leverage: u32) -> Result<(), ValidationError> {
        if !(MIN_LEVERAGE..=MAX_LEVERAGE).contains(&leverage) {
            return Err(ValidationError::InvalidLeverage);
        }
        self.leverage = leverage;
        Ok(())
    }

    pub fn set_stop_loss(&mut self, price: f64) -> Result<(), ValidationError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidStopLoss);
        }
        self.stop_loss = Some(price);
        Ok(())
    }

    /// Configure one take-profit level.
    ///
    /// The cross-level sum is only enforced by [`TradePlan::is_valid_for_trading`].
    pub fn set_take_profit(&mut self, level: u8, price: f64, percent: f64) -> Result<(), ValidationError> {
        let level = TpLevel::new(level)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidTakeProfit);
        }
        if !percent.is_finite() || percent <= 0.0 || percent > 100.0 {
            return Err(ValidationError::InvalidTakeProfit);
        }
        self.take_profits[level.index()] = Some(TakeProfit { price, percent });
        Ok(())
    }

    pub fn clear_take_profits(&mut self) {
        self.take_profits = [None; 3];
    }

    pub fn set_dry_run(&mut self, enabled: bool) {
        self.dry_run = enabled;
    }

    pub fn set_break_even(&mut self, trigger: BreakEvenTrigger) {
        self.break_even = trigger;
    }

    pub fn set_trailing_stop(&mut self, percent: f64) -> Result<(), ValidationError> {
        if !percent.is_finite() || percent <= 0.0 || percent > MAX_TRAILING_PERCENT {
            return Err(ValidationError::InvalidTrailingStop);
        }
        self.trailing_stop_percent = Some(percent);
        Ok(())
    }

    /// Also drops any seeded extreme, so re-enabling starts from the then-current price.
    pub fn disable_trailing_stop(&mut self) {
        self.trailing_stop_percent = None;
        self.state.trailing_active = false;
        self.state.extreme_price = None;
    }

    pub fn take_profit(&self, level: TpLevel) -> Option<TakeProfit> {
        self.take_profits[level.index()]
    }

    /// Configured levels in ascending order.
    pub fn configured_take_profits(&self) -> impl Iterator<Item = (TpLevel, TakeProfit)> + '_ {
        TpLevel::ALL
            .into_iter()
            .filter_map(|level| self.take_profit(level).map(|tp| (level, tp)))
    }

    pub fn total_take_profit_percent(&self) -> f64 {
        self.configured_take_profits().map(|(_, tp)| tp.percent).sum()
    }

    pub fn tp_filled(&self, level: TpLevel) -> bool {
        self.state.tp_filled[level.index()]
    }

    pub fn mark_tp_filled(&mut self, level: TpLevel) {
        self.state.tp_filled[level.index()] = true;
    }

    pub fn any_tp_filled(&self) -> bool {
        self.state.tp_filled.iter().any(|filled| *filled)
    }

    /// True when every configured level has filled (false when none is configured).
    pub fn all_configured_tps_filled(&self) -> bool {
        let mut configured = self.configured_take_profits().peekable();
        configured.peek().is_some() && configured.all(|(level, _)| self.tp_filled(level))
    }

    pub fn is_market_entry(&self) -> bool {
        self.entry_price == Some(0.0)
    }

    /// Check the plan can be submitted.
    pub fn is_valid_for_trading(&self) -> Result<(), ValidationError> {
        if self.instrument.is_none() {
            return Err(ValidationError::NotReady("Pair not set"));
        }
        if self.side.is_none() {
            return Err(ValidationError::NotReady("Side not set"));
        }
        if self.amount.is_none() {
            return Err(ValidationError::NotReady("Amount not set"));
        }
        if self.entry_price.is_none() {
            return Err(ValidationError::NotReady(
                "Entry price not set (use market order or set specific price)",
            ));
        }
        if self.total_take_profit_percent() > 100.0 {
            return Err(ValidationError::NotReady("Total TP percentages cannot exceed 100%"));
        }
        Ok(())
    }

    /// Clear every execution field in one step.
    pub fn reset_execution_state(&mut self) {
        self.state = ExecutionState::default();
    }

    /// Back to defaults, config and execution state alike.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn normalize_pair(pair: &str) -> Result<String, ValidationError> {
    let pair = pair.trim().to_uppercase();
    let pair = if pair.contains('/') {
        pair
    } else {
        format!("{}/{}", pair, DEFAULT_QUOTE)
    };

    match pair.split_once('/') {
        Some((base, quote))
            if !base.is_empty()
                && !quote.is_empty()
                && !quote.contains('/')
                && pair.chars().all(|c| c.is_ascii_alphanumeric() || c == '/') =>
        {
            Ok(pair)
        }
        _ => Err(ValidationError::InvalidPair),
    }
}
