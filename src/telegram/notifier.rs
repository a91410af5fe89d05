// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pushes trade events to the operator chat.

use crate::trading::EventReceiver;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Option<Bot>,
    chat_id: Arc<RwLock<Option<ChatId>>>,
}

impl TelegramNotifier {
    pub fn new(bot: Option<Bot>, chat_id: Option<String>) -> Self {
        info!(
            "📱 Initializing Telegram notifier: bot={}, chat_id={}",
            if bot.is_some() { "SET" } else { "NONE" },
            chat_id.as_ref().map(|_| "SET").unwrap_or("NONE")
        );

        let chat_id = chat_id.and_then(|id| match id.trim().parse::<i64>() {
            Ok(num) => Some(ChatId(num)),
            Err(_) => {
                warn!("⚠️ TELEGRAM_CHAT_ID '{}' is not a number, waiting for the first chat", id);
                None
            }
        });

        Self {
            bot,
            chat_id: Arc::new(RwLock::new(chat_id)),
        }
    }

    /// Without a configured chat, notifications follow the first chat that talks to the bot.
    pub async fn adopt_chat(&self, chat_id: ChatId) {
        let mut current = self.chat_id.write().await;
        if current.is_none() {
            info!("📱 Notifications will go to chat {}", chat_id.0);
            *current = Some(chat_id);
        }
    }

    pub async fn chat_id(&self) -> Option<ChatId> {
        *self.chat_id.read().await
    }

    pub async fn send_message(&self, message: &str) {
        let Some(bot) = &self.bot else {
            debug!("Telegram disabled, dropping notification: {}", message);
            return;
        };
        let Some(chat_id) = self.chat_id().await else {
            debug!("No notification chat yet, dropping: {}", message);
            return;
        };
        match bot.send_message(chat_id, message).await {
            Ok(_) => info!("📤 Sent Telegram message"),
            Err(e) => error!("Failed to send Telegram message: {}", e),
        }
    }
}

/// Forward every monitor event to the chat until the trading side hangs up.
pub fn spawn_event_forwarder(notifier: TelegramNotifier, mut events: EventReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = event.message();
            info!("🔔 {}", text);
            notifier.send_message(&text).await;
        }
        debug!("Event channel closed, notifier stopping");
    })
}
