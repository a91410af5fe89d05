// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod server;

pub use server::{start_api_server, ApiState};
