// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP control surface for dashboards and scripts.

use crate::plan::TradePlan;
use crate::trading::{TradeEngine, TradeError, TradeStatus};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const TOKEN_HEADER: &str = "x-api-token";

pub struct ApiState {
    pub engine: TradeEngine,
    /// Required in `x-api-token` when set.
    pub api_token: Option<String>,
    pub telegram_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

impl From<Result<String, TradeError>> for CommandResponse {
    fn from(result: Result<String, TradeError>) -> Self {
        match result {
            Ok(message) => Self { success: true, message },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub telegram_enabled: bool,
    pub trade_status: TradeStatus,
    pub config: TradePlan,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/place_trade", post(place_trade))
        .route("/api/cancel_trade", post(cancel_trade))
        .with_state(state)
}

/// Serve the API until `shutdown` fires.
pub async fn start_api_server(port: u16, state: Arc<ApiState>, shutdown: CancellationToken) -> Result<(), String> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("🌐 Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind: {}", e))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    info!("🛑 API server stopped");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

fn authorized(state: &ApiState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.api_token.as_deref() else {
        return true;
    };
    let provided = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != expected {
        warn!("Invalid API token");
        return false;
    }
    true
}

fn unauthorized() -> (StatusCode, Json<CommandResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(CommandResponse {
            success: false,
            message: "Unauthorized".to_string(),
        }),
    )
}

async fn status(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, (StatusCode, Json<CommandResponse>)> {
    if !authorized(&state, &headers) {
        return Err(unauthorized());
    }
    let (config, trade_status) = state.engine.snapshot().await;
    Ok(Json(StatusResponse {
        telegram_enabled: state.telegram_enabled,
        trade_status,
        config,
    }))
}

async fn place_trade(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> (StatusCode, Json<CommandResponse>) {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let response = CommandResponse::from(state.engine.place_trade().await);
    info!("🌐 API place_trade: {}", response.message);
    (StatusCode::OK, Json(response))
}

async fn cancel_trade(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> (StatusCode, Json<CommandResponse>) {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let response = CommandResponse::from(state.engine.cancel_trade().await);
    info!("🌐 API cancel_trade: {}", response.message);
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::MockGateway;
    use crate::plan::PlanStore;
    use crate::trading::events::{self, EventReceiver};
    use crate::trading::{OrderCoordinator, TradeDesk};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Fixture {
        state: Arc<ApiState>,
        _events: EventReceiver,
        _dir: tempfile::TempDir,
    }

    fn fixture(api_token: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path().join("plan.json"));
        let gateway = Arc::new(MockGateway::with_price(100.0));
        let (tx, rx) = events::channel(8);
        let desk = TradeDesk::new(TradePlan::default(), store, OrderCoordinator::new(gateway));
        Fixture {
            state: Arc::new(ApiState {
                engine: TradeEngine::new(desk, tx, Duration::from_millis(5)),
                api_token: api_token.map(str::to_string),
                telegram_enabled: false,
            }),
            _events: rx,
            _dir: dir,
        }
    }

    async fn call(state: &Arc<ApiState>, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = router(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let f = fixture(Some("secret"));
        let response = router(f.state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_reports_plan_and_trade() {
        let f = fixture(None);
        let (code, body) = call(&f.state, "GET", "/api/status", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["trade_status"]["trade_active"], false);
        assert_eq!(body["config"]["dry_run"], true);
        assert_eq!(body["config"]["leverage"], 1);
    }

    #[tokio::test]
    async fn commands_require_the_configured_token() {
        let f = fixture(Some("secret"));
        let (code, body) = call(&f.state, "POST", "/api/cancel_trade", Some("wrong")).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (code, body) = call(&f.state, "POST", "/api/cancel_trade", Some("secret")).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "No active trade to cancel");
    }

    #[tokio::test]
    async fn place_and_cancel_over_http() {
        let f = fixture(None);
        f.state.engine.set_pair("BTC").await.unwrap();
        f.state.engine.set_side(crate::plan::Side::Long).await.unwrap();
        f.state.engine.set_amount(1.0).await.unwrap();
        f.state.engine.set_entry(0.0).await.unwrap();
        f.state.engine.set_stop_loss(90.0).await.unwrap();

        let (_, body) = call(&f.state, "POST", "/api/place_trade", None).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Trade placed successfully in DRY RUN mode");

        let (_, body) = call(&f.state, "POST", "/api/place_trade", None).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Trade already active");

        let (_, body) = call(&f.state, "POST", "/api/cancel_trade", None).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Trade cancelled");
    }
}
