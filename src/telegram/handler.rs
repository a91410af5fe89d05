// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Long polling and command execution.

use super::callbacks::{CallbackAction, Menu};
use super::commands::Command;
use super::format;
use super::keyboards;
use super::notifier::TelegramNotifier;
use crate::trading::TradeEngine;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, Update, UpdateKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Long-poll timeout in seconds.
const POLL_TIMEOUT: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// One outgoing chat message.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Poll `getUpdates` until `shutdown` fires. Updates are handled one at a
/// time; shutdown only interrupts the wait, never a running command.
pub fn spawn_polling(
    bot: Bot,
    engine: TradeEngine,
    notifier: TelegramNotifier,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("🤖 Telegram polling started");
        // getUpdates is refused while a webhook is registered
        if let Err(e) = bot.delete_webhook().await {
            warn!("⚠️ Failed to remove Telegram webhook: {}", e);
        }
        let mut offset: i32 = 0;

        loop {
            let mut request = bot.get_updates().timeout(POLL_TIMEOUT);
            if offset > 0 {
                request = request.offset(offset);
            }

            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = update.id.0 as i32 + 1;
                        handle_update(&bot, &engine, &notifier, update).await;
                    }
                }
                Err(e) => {
                    warn!("⚠️ Telegram getUpdates failed: {}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("🛑 Telegram polling stopped");
    })
}

async fn handle_update(bot: &Bot, engine: &TradeEngine, notifier: &TelegramNotifier, update: Update) {
    match update.kind {
        UpdateKind::Message(message) => {
            let Some(text) = message.text() else {
                return;
            };
            let chat_id = message.chat.id;
            notifier.adopt_chat(chat_id).await;
            debug!("📨 {} from chat {}", text, chat_id.0);

            let replies = match Command::parse(text) {
                Ok(command) => execute(engine, command).await,
                Err(complaint) => vec![Reply::text(complaint)],
            };
            send_replies(bot, chat_id, replies).await;
        }
        UpdateKind::CallbackQuery(query) => {
            if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                warn!("Failed to answer callback: {}", e);
            }
            let Some(chat_id) = query.message.as_ref().map(|m| m.chat().id) else {
                debug!("Callback without message context");
                return;
            };
            notifier.adopt_chat(chat_id).await;

            let data = query.data.as_deref().unwrap_or_default();
            let replies = match CallbackAction::decode(data) {
                Some(action) => execute_action(engine, action).await,
                None => {
                    warn!("Unknown callback data: {}", data);
                    vec![Reply::text("Unknown action")]
                }
            };
            send_replies(bot, chat_id, replies).await;
        }
        _ => {}
    }
}

async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) {
    for reply in replies {
        let request = bot.send_message(chat_id, reply.text);
        let result = match reply.keyboard {
            Some(keyboard) => request.reply_markup(keyboard).await,
            None => request.await,
        };
        if let Err(e) = result {
            error!("Failed to send Telegram message: {}", e);
        }
    }
}

/// Run a text command against the engine.
pub async fn execute(engine: &TradeEngine, command: Command) -> Vec<Reply> {
    let reply = match command {
        Command::Start | Command::Menu => return show(engine, Menu::Main).await,
        Command::Help => return show(engine, Menu::Help).await,
        Command::SetPair(pair) => format::reply(engine.set_pair(&pair).await),
        Command::SetSide(side) => format::reply(engine.set_side(side).await),
        Command::SetAmount(amount) => format::reply(engine.set_amount(amount).await),
        Command::SetEntry(price) => format::reply(engine.set_entry(price).await),
        Command::SetTakeProfit { level, price, percent } => {
            format::reply(engine.set_take_profit(level, price, percent).await)
        }
        Command::ClearTakeProfits => format::reply(engine.clear_take_profits().await),
        Command::SetStopLoss(price) => format::reply(engine.set_stop_loss(price).await),
        Command::SetLeverage(leverage) => format::reply(engine.set_leverage(leverage).await),
        Command::SetDryRun(enabled) => format::reply(engine.set_dry_run(enabled).await),
        Command::SetBreakEven(trigger) => format::reply(engine.set_break_even(trigger).await),
        Command::SetTrailingStop(Some(percent)) => format::reply(engine.set_trailing_stop(percent).await),
        Command::SetTrailingStop(None) => format::reply(engine.disable_trailing_stop().await),
        Command::Place => place(engine).await,
        Command::Status => {
            let (plan, status) = engine.snapshot().await;
            format::status_text(&plan, &status)
        }
        Command::Cancel => format::reply(engine.cancel_trade().await),
        Command::Reset => format::reply(engine.reset_plan().await),
        Command::Balance => match engine.balances().await {
            Ok(balances) => format::balances_text(&balances),
            Err(e) => format!("❌ {}", e),
        },
        Command::Positions => match engine.positions().await {
            Ok(positions) => format::positions_text(&positions),
            Err(e) => format!("❌ {}", e),
        },
    };
    vec![Reply::text(reply)]
}

/// Run a button press. Selections answer with the outcome followed by the
/// menu they belong to.
pub async fn execute_action(engine: &TradeEngine, action: CallbackAction) -> Vec<Reply> {
    let (outcome, then) = match action {
        CallbackAction::Show(menu) => return show(engine, menu).await,
        CallbackAction::PickPair => {
            return vec![Reply::with_keyboard("📈 Select Trading Pair", keyboards::pair_menu())]
        }
        CallbackAction::PickSide => {
            return vec![Reply::with_keyboard("📊 Select Trade Direction", keyboards::side_menu())]
        }
        CallbackAction::PickLeverage => {
            return vec![Reply::with_keyboard("⚡ Select Leverage", keyboards::leverage_menu())]
        }
        CallbackAction::PickMode => {
            return vec![Reply::with_keyboard("🧪 Select Trading Mode", keyboards::mode_menu())]
        }
        CallbackAction::PickBreakEven => {
            return vec![Reply::with_keyboard(
                "🔄 Select Break-even Trigger",
                keyboards::break_even_menu(),
            )]
        }
        CallbackAction::PickAmount => {
            return vec![Reply::with_keyboard(
                "💰 Set Position Size\n\nPick a size or send /set_amount <amount> (e.g. /set_amount 100)",
                keyboards::amount_menu(),
            )]
        }
        CallbackAction::PickEntry => {
            return vec![Reply::with_keyboard("🎯 Set Entry Order", keyboards::entry_menu())]
        }
        CallbackAction::LimitEntryHelp => {
            return vec![Reply::with_keyboard(
                "🎯 Set Limit Price\n\nSend /set_entry <price> (e.g. /set_entry 45000)",
                keyboards::back_to(Menu::Config),
            )]
        }
        CallbackAction::StopLossHelp => {
            return vec![Reply::with_keyboard(
                "🛑 Set Stop Loss Price\n\nSend /set_sl <price> (e.g. /set_sl 42000)",
                keyboards::back_to(Menu::Config),
            )]
        }
        CallbackAction::TakeProfitHelp(level) => {
            let n = level.number();
            return vec![Reply::with_keyboard(
                format!(
                    "🎯 Set {}\n\nSend /set_tp{} <price> <percentage> (e.g. /set_tp{} 50000 30)",
                    level, n, n
                ),
                keyboards::back_to(Menu::TakeProfits),
            )];
        }
        CallbackAction::TrailingHelp => {
            return vec![Reply::with_keyboard(
                "📈 Set Trailing Stop\n\nSend /set_trailstop <percentage> (e.g. /set_trailstop 2.5) or /set_trailstop off",
                keyboards::back_to(Menu::Advanced),
            )]
        }
        CallbackAction::SelectPair(pair) => (engine.set_pair(&pair).await, Menu::Config),
        CallbackAction::SelectSide(side) => (engine.set_side(side).await, Menu::Config),
        CallbackAction::SelectLeverage(leverage) => (engine.set_leverage(leverage).await, Menu::Config),
        CallbackAction::SelectAmount(amount) => (engine.set_amount(amount).await, Menu::Config),
        CallbackAction::MarketEntry => (engine.set_entry(0.0).await, Menu::Config),
        CallbackAction::SelectDryRun(enabled) => (engine.set_dry_run(enabled).await, Menu::Advanced),
        CallbackAction::SelectBreakEven(trigger) => (engine.set_break_even(trigger).await, Menu::Advanced),
        CallbackAction::ClearTakeProfits => (engine.clear_take_profits().await, Menu::TakeProfits),
        CallbackAction::Status => return execute(engine, Command::Status).await,
        CallbackAction::Place => {
            return vec![Reply::with_keyboard(place(engine).await, keyboards::after_place_menu())]
        }
        CallbackAction::Cancel => return execute(engine, Command::Cancel).await,
        CallbackAction::Reset => return execute(engine, Command::Reset).await,
    };

    let mut replies = vec![Reply::text(format::reply(outcome))];
    replies.extend(show(engine, then).await);
    replies
}

async fn place(engine: &TradeEngine) -> String {
    let result = engine.place_trade().await;
    format::placed(result, &engine.config_snapshot().await)
}

async fn show(engine: &TradeEngine, menu: Menu) -> Vec<Reply> {
    let (plan, status) = engine.snapshot().await;
    let reply = match menu {
        Menu::Main => Reply::with_keyboard(format::main_menu_text(), keyboards::main_menu()),
        Menu::Help => Reply::with_keyboard(format::help_text(), keyboards::back_to(Menu::Main)),
        Menu::Config => Reply::with_keyboard(format::config_text(&plan), keyboards::config_menu()),
        Menu::Trading => Reply::with_keyboard(
            format::trading_text(&plan, &status),
            keyboards::trading_menu(plan.is_valid_for_trading().is_ok(), status.trade_active),
        ),
        Menu::Advanced => Reply::with_keyboard(format::advanced_text(&plan), keyboards::advanced_menu()),
        Menu::TakeProfits => Reply::with_keyboard(format::take_profit_text(&plan), keyboards::take_profit_menu()),
    };
    vec![reply]
}
