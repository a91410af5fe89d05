// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade Plan Bot - one futures position with staged exits, driven from Telegram.

mod api;
mod config;
mod exchange;
mod plan;
mod telegram;
mod trading;

use api::{start_api_server, ApiState};
use clap::Parser;
use config::{Cli, Config};
use exchange::{BinanceFuturesGateway, ExchangeGateway};
use plan::PlanStore;
use telegram::{spawn_event_forwarder, spawn_polling, TelegramNotifier};
use trading::{events, OrderCoordinator, TradeDesk, TradeEngine};

use anyhow::Context;
use std::sync::Arc;
use teloxide::Bot;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Buffered monitor events awaiting delivery to the chat.
const EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let mut config = Config::from_env()
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;
    config.apply(&cli);

    info!("🚀 Trade Plan Bot starting...");
    info!(
        "🏦 Exchange: {} ({})",
        config.exchange.base_url,
        if config.is_testnet() { "testnet" } else { "mainnet" }
    );
    info!("📁 Plan file: {}", config.plan_file.display());
    info!("⏱️ Monitor interval: {:?}", config.poll_interval);

    // Trading core
    let gateway: Arc<dyn ExchangeGateway> = Arc::new(
        BinanceFuturesGateway::new(config.exchange.clone()).context("Failed to build exchange client")?,
    );
    let store = PlanStore::new(config.plan_file.clone());
    let plan = store.load();
    let desk = TradeDesk::new(plan, store, OrderCoordinator::new(gateway));
    let (event_tx, event_rx) = events::channel(EVENT_BUFFER);
    let engine = TradeEngine::new(desk, event_tx, config.poll_interval);

    // Telegram
    let bot = config.telegram_token.clone().map(Bot::new);
    let notifier = TelegramNotifier::new(bot.clone(), config.telegram_chat_id.clone());
    spawn_event_forwarder(notifier.clone(), event_rx);

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    match bot {
        Some(bot) => tasks.push(spawn_polling(bot, engine.clone(), notifier.clone(), shutdown.clone())),
        None => warn!("⚠️ TELEGRAM_BOT_TOKEN not set, chat control disabled"),
    }

    // HTTP API
    if config.http_enabled {
        let state = Arc::new(ApiState {
            engine: engine.clone(),
            api_token: config.api_token.clone(),
            telegram_enabled: config.telegram_token.is_some(),
        });
        if state.api_token.is_none() {
            warn!("⚠️ API_TOKEN not set, HTTP commands are unauthenticated");
        }
        let port = config.http_port;
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = start_api_server(port, state, token).await {
                error!("API server failed: {}", e);
            }
        }));
    }

    notifier.send_message("🤖 Trade Plan Bot started").await;
    info!("✅ Bot running. Press Ctrl+C to stop.");

    signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("🛑 Shutting down...");

    shutdown.cancel();
    engine.shutdown().await;
    for task in tasks {
        if let Err(e) = task.await {
            error!("Task ended abnormally: {}", e);
        }
    }

    info!("👋 Goodbye");
    Ok(())
}
