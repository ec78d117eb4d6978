//! Common types used throughout the matchmaking service

use serde::{Deserialize, Serialize};

/// Caller-supplied identity of a chat participant
pub type Username = String;

/// Short unique identifier for chat rooms
pub type RoomCode = String;

/// Outcome of a start-chat request
///
/// Serializes to the wire shape the surrounding request layer returns to
/// clients: `{"status": "room_assigned", "room": ..., "message": ...}` or
/// `{"status": "queued", "position": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChatStartResponse {
    RoomAssigned { room: RoomCode, message: String },
    Queued { position: usize, message: String },
}

impl ChatStartResponse {
    pub fn room_assigned(room: impl Into<RoomCode>, message: impl Into<String>) -> Self {
        ChatStartResponse::RoomAssigned {
            room: room.into(),
            message: message.into(),
        }
    }

    pub fn queued(position: usize, message: impl Into<String>) -> Self {
        ChatStartResponse::Queued {
            position,
            message: message.into(),
        }
    }

    /// Assigned room code, if any
    pub fn room_code(&self) -> Option<&str> {
        match self {
            ChatStartResponse::RoomAssigned { room, .. } => Some(room),
            ChatStartResponse::Queued { .. } => None,
        }
    }

    /// Queue position, if queued
    pub fn position(&self) -> Option<usize> {
        match self {
            ChatStartResponse::RoomAssigned { .. } => None,
            ChatStartResponse::Queued { position, .. } => Some(*position),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, ChatStartResponse::Queued { .. })
    }
}

/// Snapshot of a user's standing in the wait queue
///
/// Served to polling clients while they wait for a room slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub in_queue: bool,
    /// 1-based position, 0 when not queued
    pub position: usize,
    pub queue_size: usize,
}
