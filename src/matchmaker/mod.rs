//! Matchmaking system for anonymous 1:1 chats
//!
//! This module contains the room registry, the FIFO wait queue, the engine
//! that assigns users to rooms, and the periodic maintenance tasks that
//! promote queued users and reclaim stale state.

pub mod engine;
pub mod maintenance;
pub mod queue;
pub mod room;

// Re-export commonly used types
pub use engine::{EngineStats, MatchmakingEngine};
pub use maintenance::MaintenanceTasks;
pub use queue::{QueueEntry, WaitQueue};
pub use room::{Room, RoomTable, ROOM_CAPACITY};
