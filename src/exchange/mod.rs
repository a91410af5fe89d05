// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exchange gateway - venue operations the trading core depends on.
//!
//! The core only reads the logical fields of each result (`last`, `id`,
//! `status`, `filled`, `average`); wire formats stay inside the
//! implementations.

pub mod auth;
pub mod binance;
#[cfg(test)]
pub mod mock;

pub use binance::BinanceFuturesGateway;

use crate::plan::OrderSide;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failed venue call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("exchange rejected request ({code}): {msg}")]
    Api { code: i64, msg: String },
    #[error("unexpected exchange response: {0}")]
    Decode(String),
    #[error("API credentials not configured")]
    MissingCredentials,
}

/// Venue-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub last: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub asset: String,
    pub total: f64,
    pub free: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

/// Snapshot of one venue order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReport {
    pub id: OrderId,
    pub status: OrderStatus,
    /// Executed quantity.
    pub filled: f64,
    /// Average fill price, when anything filled.
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionInfo {
    pub instrument: String,
    /// Signed quantity: positive long, negative short.
    pub size: f64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
    pub leverage: u32,
}

/// Venue capabilities used by the trading core.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn get_ticker(&self, instrument: &str) -> Result<Ticker, GatewayError>;

    async fn get_balance(&self) -> Result<Vec<Balance>, GatewayError>;

    async fn create_market_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderReport, GatewayError>;

    async fn create_limit_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderReport, GatewayError>;

    /// Reduce-only limit order closing part of the position.
    async fn create_exit_limit_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderReport, GatewayError>;

    /// Reduce-only stop-market order triggered at `stop_price`.
    async fn create_stop_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
        stop_price: f64,
    ) -> Result<OrderReport, GatewayError>;

    async fn cancel_order(&self, instrument: &str, id: &OrderId) -> Result<(), GatewayError>;

    async fn get_order_status(&self, instrument: &str, id: &OrderId) -> Result<OrderReport, GatewayError>;

    async fn get_positions(&self, instrument: Option<&str>) -> Result<Vec<PositionInfo>, GatewayError>;

    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<(), GatewayError>;
}
