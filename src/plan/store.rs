// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade plan persistence (single JSON record).

use super::TradePlan;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const DEFAULT_PLAN_FILE: &str = "trade_plan.json";

/// Loads and saves the plan record.
#[derive(Debug, Clone)]
pub struct PlanStore {
    path: PathBuf,
}

impl PlanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the plan from file, falling back to defaults.
    pub fn load(&self) -> TradePlan {
        if !self.path.exists() {
            info!("No plan file at {}, starting fresh", self.path.display());
            return TradePlan::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<TradePlan>(&content) {
                Ok(plan) => {
                    info!(
                        "Loaded trade plan from {} ({})",
                        self.path.display(),
                        plan.instrument.as_deref().unwrap_or("no pair")
                    );
                    plan
                }
                Err(e) => {
                    error!("Failed to parse plan file: {}", e);
                    TradePlan::default()
                }
            },
            Err(e) => {
                error!("Failed to read plan file: {}", e);
                TradePlan::default()
            }
        }
    }

    /// Save the plan to file.
    pub fn save(&self, plan: &TradePlan) -> Result<(), String> {
        let content = serde_json::to_string_pretty(plan)
            .map_err(|e| format!("Failed to serialize plan: {}", e))?;

        fs::write(&self.path, content)
            .map_err(|e| format!("Failed to write plan file: {}", e))?;

        debug!("Saved trade plan to {}", self.path.display());
        Ok(())
    }
}
