//! Engine configuration
//!
//! Constants for the sampling cadences plus the runtime [`EngineConfig`],
//! which can come from defaults, environment variables or a JSON file.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default seconds between minute-clock samples
pub const DEFAULT_MINUTE_INTERVAL_SECS: u64 = 30;

/// A reminder at minute M must be seen by some sample inside M. Samples can
/// land up to a driver tick late, so the cadence stays at half a minute.
pub const MAX_MINUTE_INTERVAL_SECS: u64 = 30;

/// Countdown tick period in seconds (not configurable)
pub const SECOND_INTERVAL_SECS: u64 = 1;

/// Folder created under the platform's local data directory
pub const DATA_DIR_NAME: &str = "ReminderEngine";

/// File name for the persisted fired-set
pub const FIRED_SET_FILE: &str = "fired.json";

/// Name used in reminder messages when the host did not supply one
pub const DEFAULT_USER_NAME: &str = "User";

const ENV_MINUTE_INTERVAL: &str = "REMINDER_ENGINE_MINUTE_INTERVAL_SECS";
const ENV_INVALIDATE: &str = "REMINDER_ENGINE_INVALIDATE_ON_RESCHEDULE";
const ENV_PERSIST: &str = "REMINDER_ENGINE_PERSIST_FIRED";
const ENV_USER_NAME: &str = "REMINDER_ENGINE_USER_NAME";

/// Runtime options for the notification engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Seconds between minute-clock samples, 1..=30
    pub minute_interval_secs: u64,
    /// Drop fired keys when an entity is deleted or its schedule changes
    pub invalidate_on_reschedule: bool,
    /// Keep the fired-set on disk instead of only for the session
    pub persist_fired_set: bool,
    /// Display name used in task reminder messages
    pub user_name: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minute_interval_secs: DEFAULT_MINUTE_INTERVAL_SECS,
            invalidate_on_reschedule: true,
            persist_fired_set: false,
            user_name: None,
        }
    }
}

impl EngineConfig {
    /// Build a config from `REMINDER_ENGINE_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MINUTE_INTERVAL) {
            config.minute_interval_secs = raw.trim().parse().map_err(|_| {
                AppError::config(format!("{} must be a whole number, got {:?}", ENV_MINUTE_INTERVAL, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_INVALIDATE) {
            config.invalidate_on_reschedule = parse_flag(ENV_INVALIDATE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PERSIST) {
            config.persist_fired_set = parse_flag(ENV_PERSIST, &raw)?;
        }
        if let Some(raw) = lookup(ENV_USER_NAME) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.user_name = Some(trimmed.to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| AppError::config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.minute_interval_secs == 0 || self.minute_interval_secs > MAX_MINUTE_INTERVAL_SECS {
            return Err(AppError::config(format!(
                "minute interval must be between 1 and {} seconds, got {}",
                MAX_MINUTE_INTERVAL_SECS, self.minute_interval_secs
            )));
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(DEFAULT_USER_NAME)
    }
}

fn parse_flag(key: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::config(format!("{} must be a boolean, got {:?}", key, other))),
    }
}
