//! ChatMix Matchmaker - anonymous 1:1 chat matchmaking service
//!
//! This crate pairs users into two-person chat rooms, queues them FIFO when
//! room capacity is exhausted, and reclaims abandoned state with periodic
//! maintenance sweeps. The surrounding transport layer owns message
//! delivery; this crate only governs room membership.

pub mod config;
pub mod error;
pub mod events;
pub mod matchmaker;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use events::{ChatEvent, ChatEventPublisher, LogEventPublisher, RoomCloseReason};
pub use matchmaker::{
    EngineStats, MaintenanceTasks, MatchmakingEngine, QueueEntry, Room, WaitQueue,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
