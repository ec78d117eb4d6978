//! Configuration management for the chatmix-matchmaker service
//!
//! This module handles all configuration loading from environment variables,
//! validation, and default values for the matchmaking service.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ChatSettings, ServiceSettings};
