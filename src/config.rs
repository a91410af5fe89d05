// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration module - loads settings from environment variables,
//! then applies command-line overrides.

use crate::exchange::binance::{BinanceConfig, DEFAULT_REQUEST_TIMEOUT, MAINNET_URL, TESTNET_URL};
use crate::plan::DEFAULT_PLAN_FILE;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line overrides. Anything left out comes from the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "trade-plan-bot")]
#[command(about = "Single-position futures trade bot with Telegram control", long_about = None)]
pub struct Cli {
    /// Plan file location (PLAN_FILE)
    #[arg(long)]
    pub plan_file: Option<PathBuf>,

    /// HTTP API port (HTTP_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds between monitor ticks (POLL_INTERVAL_SECS)
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Use the production futures endpoint instead of testnet
    #[arg(long)]
    pub mainnet: bool,

    /// Do not start the HTTP API
    #[arg(long)]
    pub no_api: bool,

    /// Do not start Telegram polling or notifications
    #[arg(long)]
    pub no_telegram: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Exchange
    pub exchange: BinanceConfig,

    // Engine
    pub plan_file: PathBuf,
    pub poll_interval: Duration,

    // HTTP API
    pub http_enabled: bool,
    pub http_port: u16,
    pub api_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let testnet = parse_flag("EXCHANGE_TESTNET", &env_var_or("EXCHANGE_TESTNET", "true"))?;
        let base_url = optional_env("EXCHANGE_BASE_URL").unwrap_or_else(|| default_base_url(testnet).to_string());

        Ok(Self {
            // Telegram
            telegram_token: optional_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: optional_env("TELEGRAM_CHAT_ID"),

            // Exchange
            exchange: BinanceConfig {
                api_key: optional_env("EXCHANGE_API_KEY"),
                api_secret: optional_env("EXCHANGE_API_SECRET"),
                base_url,
                recv_window: env_var_or("EXCHANGE_RECV_WINDOW", "5000")
                    .parse()
                    .unwrap_or(5000),
                request_timeout: optional_env("EXCHANGE_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| Duration::from_secs(secs.max(1)))
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            },

            // Engine
            plan_file: PathBuf::from(env_var_or("PLAN_FILE", DEFAULT_PLAN_FILE)),
            poll_interval: Duration::from_secs(
                env_var_or("POLL_INTERVAL_SECS", "2")
                    .parse::<u64>()
                    .unwrap_or(2)
                    .max(1),
            ),

            // HTTP API
            http_enabled: true,
            http_port: env_var_or("HTTP_PORT", "5000").parse().unwrap_or(5000),
            api_token: optional_env("API_TOKEN"),
        })
    }

    /// Command-line flags win over the environment.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(path) = &cli.plan_file {
            self.plan_file = path.clone();
        }
        if let Some(port) = cli.port {
            self.http_port = port;
        }
        if let Some(secs) = cli.poll_interval {
            self.poll_interval = Duration::from_secs(secs.max(1));
        }
        if cli.mainnet && self.exchange.base_url == TESTNET_URL {
            self.exchange.base_url = MAINNET_URL.to_string();
        }
        if cli.no_api {
            self.http_enabled = false;
        }
        if cli.no_telegram {
            self.telegram_token = None;
        }
    }

    pub fn is_testnet(&self) -> bool {
        self.exchange.base_url == TESTNET_URL
    }
}

fn default_base_url(testnet: bool) -> &'static str {
    if testnet {
        TESTNET_URL
    } else {
        MAINNET_URL
    }
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank both mean "not configured".
fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(name: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("{} must be true or false, got '{}'", name, other)),
    }
}
