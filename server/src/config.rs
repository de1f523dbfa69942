//! Server configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Hall broadcast interval in milliseconds. The hall broadcasts nothing,
    /// so this only paces its idle loop.
    pub hall_tick_ms: u64,
    /// Room broadcast interval in milliseconds.
    pub room_tick_ms: u64,
    /// Maximum users per room.
    pub room_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hall_tick_ms: 60_000,
            room_tick_ms: 100,
            room_capacity: 8,
        }
    }
}

impl ServerConfig {
    pub fn hall_tick(&self) -> Duration {
        Duration::from_millis(self.hall_tick_ms)
    }

    pub fn room_tick(&self) -> Duration {
        Duration::from_millis(self.room_tick_ms)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.hall_tick_ms == 0 {
            return Err("hallTickMs must be positive".to_string());
        }
        if self.room_tick_ms == 0 {
            return Err("roomTickMs must be positive".to_string());
        }
        if self.room_capacity == 0 {
            return Err("roomCapacity must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
