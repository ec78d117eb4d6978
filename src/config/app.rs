//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! chatmix-matchmaker service, including environment variable loading,
//! optional TOML file loading, and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub chat: ChatSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health/metrics endpoint
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Maximum number of concurrently active rooms
    pub max_rooms: usize,
    /// How long a queue entry may wait before the expiry sweep drops it
    pub queue_timeout_seconds: u64,
    /// Tick period of the lonely-room reaper; doubles as the staleness
    /// threshold, so a one-member room survives between one and two
    /// intervals
    pub room_cleanup_interval_seconds: u64,
    /// Tick period of the queue-to-room promotion sweep
    pub promotion_interval_seconds: u64,
    /// Tick period of the queue expiry sweep
    pub queue_sweep_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "chatmix-matchmaker".to_string(),
            log_level: "info".to_string(),
            metrics_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_rooms: 100,
            queue_timeout_seconds: 120,           // 2 minutes
            room_cleanup_interval_seconds: 300,   // 5 minutes
            promotion_interval_seconds: 5,
            queue_sweep_interval_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("METRICS_PORT") {
            config.service.metrics_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(max_rooms) = env::var("MAX_ROOMS") {
            config.chat.max_rooms = max_rooms
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_ROOMS value: {}", max_rooms))?;
        }
        if let Ok(timeout) = env::var("QUEUE_TIMEOUT_SECONDS") {
            config.chat.queue_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(interval) = env::var("ROOM_CLEANUP_INTERVAL_SECONDS") {
            config.chat.room_cleanup_interval_seconds = interval.parse().map_err(|_| {
                anyhow!("Invalid ROOM_CLEANUP_INTERVAL_SECONDS value: {}", interval)
            })?;
        }
        if let Ok(interval) = env::var("PROMOTION_INTERVAL_SECONDS") {
            config.chat.promotion_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid PROMOTION_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(interval) = env::var("QUEUE_SWEEP_INTERVAL_SECONDS") {
            config.chat.queue_sweep_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_SWEEP_INTERVAL_SECONDS value: {}", interval))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

impl ChatSettings {
    /// Queue-entry time-to-live, for expiry math against `queued_at`
    pub fn queue_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.queue_timeout_seconds as i64)
    }

    /// Staleness threshold for the lonely-room reaper
    pub fn room_cleanup_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.room_cleanup_interval_seconds as i64)
    }

    /// Tick period of the lonely-room reaper
    pub fn room_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.room_cleanup_interval_seconds)
    }

    /// Tick period of the promotion sweep
    pub fn promotion_interval(&self) -> Duration {
        Duration::from_secs(self.promotion_interval_seconds)
    }

    /// Tick period of the queue expiry sweep
    pub fn queue_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.queue_sweep_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.chat.max_rooms == 0 {
        return Err(anyhow!("Max rooms must be greater than 0"));
    }
    if config.chat.queue_timeout_seconds == 0 {
        return Err(anyhow!("Queue timeout must be greater than 0"));
    }
    if config.chat.room_cleanup_interval_seconds == 0 {
        return Err(anyhow!("Room cleanup interval must be greater than 0"));
    }
    if config.chat.promotion_interval_seconds == 0 {
        return Err(anyhow!("Promotion interval must be greater than 0"));
    }
    if config.chat.queue_sweep_interval_seconds == 0 {
        return Err(anyhow!("Queue sweep interval must be greater than 0"));
    }

    Ok(())
}
