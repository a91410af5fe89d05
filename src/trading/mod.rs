// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade lifecycle: order coordination, risk decisions and position supervision.

pub mod desk;
pub mod engine;
pub mod error;
pub mod events;
pub mod monitor;
pub mod orders;
pub mod risk;

pub use desk::{TradeDesk, TradePhase, TradeStatus};
pub use engine::TradeEngine;
pub use error::TradeError;
pub use events::{EventReceiver, EventSender, TradeEvent};
pub use orders::{OrderBook, OrderCoordinator, OrderSlot};
