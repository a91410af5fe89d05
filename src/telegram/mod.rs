// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Telegram front-end: chat commands, inline menus and trade notifications.

pub mod callbacks;
pub mod commands;
pub mod format;
pub mod handler;
pub mod keyboards;
pub mod notifier;

pub use handler::spawn_polling;
pub use notifier::{spawn_event_forwarder, TelegramNotifier};
