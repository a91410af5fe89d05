// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! USDT-margined perpetual futures gateway (Binance `/fapi` REST API).
//!
//! | Operation     | Method | Path                  | Signed |
//! |---------------|--------|-----------------------|--------|
//! | Ticker        | GET    | `/fapi/v1/ticker/price` | no   |
//! | Balance       | GET    | `/fapi/v2/balance`    | yes    |
//! | New order     | POST   | `/fapi/v1/order`      | yes    |
//! | Cancel order  | DELETE | `/fapi/v1/order`      | yes    |
//! | Query order   | GET    | `/fapi/v1/order`      | yes    |
//! | Positions     | GET    | `/fapi/v2/positionRisk` | yes  |
//! | Leverage      | POST   | `/fapi/v1/leverage`   | yes    |

use super::auth;
use super::{Balance, ExchangeGateway, GatewayError, OrderId, OrderReport, OrderStatus, PositionInfo, Ticker};
use crate::plan::OrderSide;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

pub const MAINNET_URL: &str = "https://fapi.binance.com";
pub const TESTNET_URL: &str = "https://testnet.binancefuture.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the futures gateway.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: String,
    pub recv_window: u64,
    /// Upper bound for one HTTP round trip, connect included.
    pub request_timeout: Duration,
}

/// Futures REST client implementing [`ExchangeGateway`].
pub struct BinanceFuturesGateway {
    http: reqwest::Client,
    config: BinanceConfig,
}

impl BinanceFuturesGateway {
    pub fn new(config: BinanceConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        info!(
            "🏦 Futures gateway: {} (keys: {}, timeout {:?})",
            config.base_url,
            if config.api_key.is_some() && config.api_secret.is_some() {
                "SET"
            } else {
                "NONE"
            },
            config.request_timeout
        );
        Ok(Self { http, config })
    }

    async fn public_get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.config.base_url, path);
        let resp = self.http.get(&url).query(params).send().await?;
        read_body(resp).await
    }

    async fn signed(&self, method: Method, path: &str, mut params: Vec<(&str, String)>) -> Result<Value, GatewayError> {
        let (Some(key), Some(secret)) = (&self.config.api_key, &self.config.api_secret) else {
            return Err(GatewayError::MissingCredentials);
        };

        params.push(("recvWindow", self.config.recv_window.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));
        let query = auth::signed_query(&params, secret);
        let url = format!("{}{}?{}", self.config.base_url, path, query);

        debug!("{} {}", method, path);
        let resp = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", key)
            .send()
            .await?;
        read_body(resp).await
    }

    async fn new_order(&self, params: Vec<(&str, String)>) -> Result<OrderReport, GatewayError> {
        let body = self.signed(Method::POST, "/fapi/v1/order", params).await?;
        parse_order(&body)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesGateway {
    async fn get_ticker(&self, instrument: &str) -> Result<Ticker, GatewayError> {
        let body = self
            .public_get("/fapi/v1/ticker/price", &[("symbol", venue_symbol(instrument))])
            .await?;
        Ok(Ticker {
            last: number_field(&body, "price")?,
        })
    }

    async fn get_balance(&self) -> Result<Vec<Balance>, GatewayError> {
        let body = self.signed(Method::GET, "/fapi/v2/balance", Vec::new()).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| GatewayError::Decode("balance response is not an array".to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Balance {
                    asset: string_field(row, "asset")?,
                    total: number_field(row, "balance")?,
                    free: number_field(row, "availableBalance")?,
                })
            })
            .collect()
    }

    async fn create_market_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.new_order(vec![
            ("symbol", venue_symbol(instrument)),
            ("side", venue_side(side).to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format_decimal(amount)),
            ("newOrderRespType", "RESULT".to_string()),
        ])
        .await
    }

    async fn create_limit_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.new_order(limit_params(instrument, side, amount, price, false)).await
    }

    async fn create_exit_limit_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.new_order(limit_params(instrument, side, amount, price, true)).await
    }

    async fn create_stop_order(
        &self,
        instrument: &str,
        side: OrderSide,
        amount: f64,
        stop_price: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.new_order(vec![
            ("symbol", venue_symbol(instrument)),
            ("side", venue_side(side).to_string()),
            ("type", "STOP_MARKET".to_string()),
            ("quantity", format_decimal(amount)),
            ("stopPrice", format_decimal(stop_price)),
            ("reduceOnly", "true".to_string()),
        ])
        .await
    }

    async fn cancel_order(&self, instrument: &str, id: &OrderId) -> Result<(), GatewayError> {
        self.signed(
            Method::DELETE,
            "/fapi/v1/order",
            vec![("symbol", venue_symbol(instrument)), ("orderId", id.0.clone())],
        )
        .await?;
        Ok(())
    }

    async fn get_order_status(&self, instrument: &str, id: &OrderId) -> Result<OrderReport, GatewayError> {
        let body = self
            .signed(
                Method::GET,
                "/fapi/v1/order",
                vec![("symbol", venue_symbol(instrument)), ("orderId", id.0.clone())],
            )
            .await?;
        parse_order(&body)
    }

    async fn get_positions(&self, instrument: Option<&str>) -> Result<Vec<PositionInfo>, GatewayError> {
        let params = instrument
            .map(|i| vec![("symbol", venue_symbol(i))])
            .unwrap_or_default();
        let body = self.signed(Method::GET, "/fapi/v2/positionRisk", params).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| GatewayError::Decode("positionRisk response is not an array".to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(PositionInfo {
                    instrument: string_field(row, "symbol")?,
                    size: number_field(row, "positionAmt")?,
                    entry_price: number_field(row, "entryPrice")?,
                    unrealized_pnl: number_field(row, "unRealizedProfit")?,
                    leverage: number_field(row, "leverage")? as u32,
                })
            })
            .collect()
    }

    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<(), GatewayError> {
        self.signed(
            Method::POST,
            "/fapi/v1/leverage",
            vec![("symbol", venue_symbol(instrument)), ("leverage", leverage.to_string())],
        )
        .await?;
        info!("Leverage set to {}x for {}", leverage, instrument);
        Ok(())
    }
}

/// `BTC/USDT` -> `BTCUSDT`.
pub fn venue_symbol(instrument: &str) -> String {
    instrument.replace('/', "").to_uppercase()
}

fn venue_side(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "BUY",
        OrderSide::Sell => "SELL",
    }
}

/// GTC limit order. Exits are reduce-only so a late fill can never open
/// a position in the other direction.
fn limit_params(
    instrument: &str,
    side: OrderSide,
    amount: f64,
    price: f64,
    reduce_only: bool,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", venue_symbol(instrument)),
        ("side", venue_side(side).to_string()),
        ("type", "LIMIT".to_string()),
        ("timeInForce", "GTC".to_string()),
        ("quantity", format_decimal(amount)),
        ("price", format_decimal(price)),
    ];
    if reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    params
}

/// Map a venue order status onto the three states the core cares about.
pub fn map_status(status: &str) -> Result<OrderStatus, GatewayError> {
    match status {
        "NEW" | "PARTIALLY_FILLED" => Ok(OrderStatus::Open),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELED" | "EXPIRED" | "REJECTED" | "EXPIRED_IN_MATCH" => Ok(OrderStatus::Canceled),
        other => Err(GatewayError::Decode(format!("unknown order status {}", other))),
    }
}

/// Plain decimal rendering with at most 8 fractional digits.
fn format_decimal(value: f64) -> String {
    let s = format!("{:.8}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

async fn read_body(resp: reqwest::Response) -> Result<Value, GatewayError> {
    let status = resp.status();
    let body: Value = resp.json().await?;
    if status.is_success() {
        return Ok(body);
    }
    Err(GatewayError::Api {
        code: body.get("code").and_then(Value::as_i64).unwrap_or(i64::from(status.as_u16())),
        msg: body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    })
}

fn parse_order(body: &Value) -> Result<OrderReport, GatewayError> {
    let id = match body.get("orderId") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return Err(GatewayError::Decode("orderId missing".to_string())),
    };
    let status = map_status(&string_field(body, "status")?)?;
    let filled = number_field(body, "executedQty").unwrap_or(0.0);
    let average = number_field(body, "avgPrice").ok().filter(|p| *p > 0.0);

    Ok(OrderReport {
        id: OrderId(id),
        status,
        filled,
        average,
    })
}

fn string_field(value: &Value, key: &str) -> Result<String, GatewayError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Decode(format!("{} missing", key)))
}

/// Numbers arrive as JSON strings on this venue; accept both.
fn number_field(value: &Value, key: &str) -> Result<f64, GatewayError> {
    match value.get(key) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| GatewayError::Decode(format!("{} is not numeric: {}", key, s))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| GatewayError::Decode(format!("{} out of range", key))),
        _ => Err(GatewayError::Decode(format!("{} missing", key))),
    }
}
