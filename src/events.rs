//! Membership-change events emitted by the matchmaking engine
//!
//! The engine announces room membership changes through the
//! [`ChatEventPublisher`] seam so the real-time transport layer can react
//! (close sockets for reaped rooms, notify a waiting peer) without polling.
//! Delivery is best-effort: a publisher failure is logged and never fails
//! the engine operation that produced the event.

use crate::error::Result;
use crate::types::{RoomCode, Username};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Why a room was removed from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomCloseReason {
    /// The last member left
    Emptied,
    /// One member sat alone past the cleanup interval
    Reaped,
}

/// Union type for all membership-change events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    RoomCreated {
        room: RoomCode,
        username: Username,
        timestamp: DateTime<Utc>,
    },
    UserJoined {
        room: RoomCode,
        username: Username,
        members: Vec<Username>,
        timestamp: DateTime<Utc>,
    },
    UserLeft {
        room: RoomCode,
        username: Username,
        remaining: Vec<Username>,
        timestamp: DateTime<Utc>,
    },
    UserPromoted {
        room: RoomCode,
        username: Username,
        timestamp: DateTime<Utc>,
    },
    RoomClosed {
        room: RoomCode,
        reason: RoomCloseReason,
        timestamp: DateTime<Utc>,
    },
}

impl ChatEvent {
    /// Room code the event concerns
    pub fn room_code(&self) -> &str {
        match self {
            ChatEvent::RoomCreated { room, .. }
            | ChatEvent::UserJoined { room, .. }
            | ChatEvent::UserLeft { room, .. }
            | ChatEvent::UserPromoted { room, .. }
            | ChatEvent::RoomClosed { room, .. } => room,
        }
    }

    /// Stable event name for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::RoomCreated { .. } => "room_created",
            ChatEvent::UserJoined { .. } => "user_joined",
            ChatEvent::UserLeft { .. } => "user_left",
            ChatEvent::UserPromoted { .. } => "user_promoted",
            ChatEvent::RoomClosed { .. } => "room_closed",
        }
    }
}

/// Trait for publishing membership-change events
#[async_trait]
pub trait ChatEventPublisher: Send + Sync {
    /// Publish a single event
    async fn publish(&self, event: ChatEvent) -> Result<()>;
}

/// Publisher that writes events to the structured log
///
/// The default production implementation. Deployments with a real fan-out
/// layer supply their own [`ChatEventPublisher`] when constructing the engine.
#[derive(Debug, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl ChatEventPublisher for LogEventPublisher {
    async fn publish(&self, event: ChatEvent) -> Result<()> {
        info!(
            event = event.kind(),
            room = event.room_code(),
            "chat event"
        );
        Ok(())
    }
}
