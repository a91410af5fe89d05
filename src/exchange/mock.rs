// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scripted in-memory gateway for tests.

use super::{Balance, ExchangeGateway, GatewayError, OrderId, OrderReport, OrderStatus, PositionInfo, Ticker};
use crate::plan::OrderSide;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

#[derive(Debug, Clone)]
pub struct MockOrder {
    pub kind: OrderKind,
    pub side: OrderSide,
    pub amount: f64,
    pub price: Option<f64>,
    pub reduce_only: bool,
    pub status: OrderStatus,
    pub filled: f64,
}

#[derive(Default)]
struct State {
    price: f64,
    next_id: u64,
    orders: HashMap<String, MockOrder>,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<State>,
}

impl MockGateway {
    pub fn with_price(price: f64) -> Self {
        let gateway = Self::default();
        gateway.set_price(price);
        gateway
    }

    pub fn set_price(&self, price: f64) {
        self.state.lock().unwrap().price = price;
    }

    /// Make every call of `operation` (trait method name) fail.
    pub fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.remove(operation);
    }

    /// Mark an order filled at its full size.
    pub fn fill(&self, id: &OrderId) {
        let mut state = self.state.lock().unwrap();
        let order = state.orders.get_mut(&id.0).expect("unknown mock order");
        order.status = OrderStatus::Filled;
        order.filled = order.amount;
    }

    /// Venue cancels or expires the order after `filled` of it executed.
    pub fn cancel_partially_filled(&self, id: &OrderId, filled: f64) {
        let mut state = self.state.lock().unwrap();
        let order = state.orders.get_mut(&id.0).expect("unknown mock order");
        order.status = OrderStatus::Canceled;
        order.filled = filled;
    }

    pub fn cancel_on_venue(&self, id: &OrderId) {
        let mut state = self.state.lock().unwrap();
        let order = state.orders.get_mut(&id.0).expect("unknown mock order");
        order.status = OrderStatus::Canceled;
    }

    pub fn order(&self, id: &OrderId) -> MockOrder {
        self.state.lock().unwrap().orders[&id.0].clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, State>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        if state.failing.contains(operation) {
            return Err(GatewayError::Api {
                code: -1000,
                msg: format!("{} unavailable", operation),
            });
        }
        Ok(state)
    }

    fn create(&self, operation: &'static str, order: MockOrder) -> Result<OrderReport, GatewayError> {
        let mut state = self.enter(operation)?;
        state.next_id += 1;
        let id = state.next_id.to_string();
        let report = report(&id, &order);
        state.orders.insert(id, order);
        Ok(report)
    }
}

fn report(id: &str, order: &MockOrder) -> OrderReport {
    OrderReport {
        id: OrderId(id.to_string()),
        status: order.status,
        filled: order.filled,
        average: (order.filled > 0.0).then(|| order.price.unwrap_or_default()),
    }
}

#[async_trait]
impl ExchangeGateway for MockGateway {
    async fn get_ticker(&self, _instrument: &str) -> Result<Ticker, GatewayError> {
        let state = self.enter("get_ticker")?;
        Ok(Ticker { last: state.price })
    }

    async fn get_balance(&self) -> Result<Vec<Balance>, GatewayError> {
        self.enter("get_balance")?;
        Ok(vec![Balance {
            asset: "USDT".to_string(),
            total: 1000.0,
            free: 750.0,
        }])
    }

    async fn create_market_order(
        &self,
        _instrument: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderReport, GatewayError> {
        let price = self.state.lock().unwrap().price;
        self.create(
            "create_market_order",
            MockOrder {
                kind: OrderKind::Market,
                side,
                amount,
                price: Some(price),
                reduce_only: false,
                status: OrderStatus::Filled,
                filled: amount,
            },
        )
    }

    async fn create_limit_order(
        &self,
        _instrument: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.create(
            "create_limit_order",
            MockOrder {
                kind: OrderKind::Limit,
                side,
                amount,
                price: Some(price),
                reduce_only: false,
                status: OrderStatus::Open,
                filled: 0.0,
            },
        )
    }

    async fn create_exit_limit_order(
        &self,
        _instrument: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.create(
            "create_exit_limit_order",
            MockOrder {
                kind: OrderKind::Limit,
                side,
                amount,
                price: Some(price),
                reduce_only: true,
                status: OrderStatus::Open,
                filled: 0.0,
            },
        )
    }

    async fn create_stop_order(
        &self,
        _instrument: &str,
        side: OrderSide,
        amount: f64,
        stop_price: f64,
    ) -> Result<OrderReport, GatewayError> {
        self.create(
            "create_stop_order",
            MockOrder {
                kind: OrderKind::Stop,
                side,
                amount,
                price: Some(stop_price),
                reduce_only: true,
                status: OrderStatus::Open,
                filled: 0.0,
            },
        )
    }

    async fn cancel_order(&self, _instrument: &str, id: &OrderId) -> Result<(), GatewayError> {
        let mut state = self.enter("cancel_order")?;
        match state.orders.get_mut(&id.0) {
            Some(order) if order.status == OrderStatus::Open => {
                order.status = OrderStatus::Canceled;
                Ok(())
            }
            _ => Err(GatewayError::Api {
                code: -2011,
                msg: "Unknown order sent.".to_string(),
            }),
        }
    }

    async fn get_order_status(&self, _instrument: &str, id: &OrderId) -> Result<OrderReport, GatewayError> {
        let state = self.enter("get_order_status")?;
        state
            .orders
            .get(&id.0)
            .map(|order| report(&id.0, order))
            .ok_or_else(|| GatewayError::Decode(format!("no order {}", id)))
    }

    async fn get_positions(&self, instrument: Option<&str>) -> Result<Vec<PositionInfo>, GatewayError> {
        self.enter("get_positions")?;
        Ok(vec![PositionInfo {
            instrument: instrument.unwrap_or("BTCUSDT").to_string(),
            size: 0.0,
            entry_price: 0.0,
            unrealized_pnl: 0.0,
            leverage: 1,
        }])
    }

    async fn set_leverage(&self, _instrument: &str, _leverage: u32) -> Result<(), GatewayError> {
        self.enter("set_leverage")?;
        Ok(())
    }
}
