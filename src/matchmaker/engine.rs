//! Matchmaking engine: room assignment, wait queue, and the query surface
//!
//! The engine owns the room registry and the wait queue, each behind its own
//! reader/writer lock. Critical sections are in-memory pointer and index
//! manipulation only; no I/O and no awaiting happens while a lock is held.
//!
//! Lock order: every path that takes both locks takes the **queue lock
//! before the rooms lock** (`start_chat`, promotion sweep). Single-lock
//! paths may take either lock alone.

use crate::config::ChatSettings;
use crate::error::{MatchmakingError, Result};
use crate::events::{ChatEvent, ChatEventPublisher, LogEventPublisher, RoomCloseReason};
use crate::matchmaker::queue::WaitQueue;
use crate::matchmaker::room::{Room, RoomTable};
use crate::metrics::MetricsCollector;
use crate::types::{ChatStartResponse, QueueStatus};
use crate::utils::current_timestamp;
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Statistics about engine operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Total start-chat requests handled
    pub chats_started: u64,
    /// Total rooms created
    pub rooms_created: u64,
    /// Total lonely rooms reaped
    pub rooms_reaped: u64,
    /// Total users sent to the wait queue
    pub users_queued: u64,
    /// Total users promoted from the queue into rooms
    pub users_promoted: u64,
    /// Total queue entries dropped by the expiry sweep
    pub queue_expirations: u64,
    /// Current number of active rooms
    pub active_rooms: usize,
    /// Current number of one-member rooms
    pub waiting_rooms: usize,
    /// Current number of queued users
    pub queue_depth: usize,
}

/// How a start-chat request was resolved; drives stats and logging
#[derive(Clone, Copy)]
enum StartOutcome {
    AlreadyInRoom,
    JoinedWaiting,
    CreatedRoom,
    AlreadyQueued,
    Queued,
}

/// The matchmaking engine
///
/// Cheap to clone; clones share the same registry, queue, and statistics.
#[derive(Clone)]
pub struct MatchmakingEngine {
    /// Active rooms by code
    rooms: Arc<RwLock<RoomTable>>,
    /// FIFO wait queue
    queue: Arc<RwLock<WaitQueue>>,
    /// Matchmaking settings, validated by the configuration loader
    settings: ChatSettings,
    /// Seam for the external fan-out layer; publish failures are logged,
    /// never propagated
    event_publisher: Arc<dyn ChatEventPublisher>,
    /// Metrics collector for recording performance data
    metrics: Arc<MetricsCollector>,
    /// Engine statistics
    stats: Arc<RwLock<EngineStats>>,
}

impl MatchmakingEngine {
    /// Create an engine that publishes events to the structured log
    pub fn new(settings: ChatSettings) -> Self {
        Self::with_publisher(settings, Arc::new(LogEventPublisher))
    }

    /// Create an engine with a custom event publisher
    pub fn with_publisher(
        settings: ChatSettings,
        event_publisher: Arc<dyn ChatEventPublisher>,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_publisher_and_metrics(settings, event_publisher, metrics)
    }

    /// Create an engine with a custom event publisher and metrics collector
    pub fn with_publisher_and_metrics(
        settings: ChatSettings,
        event_publisher: Arc<dyn ChatEventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(RoomTable::new(settings.max_rooms))),
            queue: Arc::new(RwLock::new(WaitQueue::new())),
            settings,
            event_publisher,
            metrics,
            stats: Arc::new(RwLock::new(EngineStats::default())),
        }
    }

    /// Matchmaking settings this engine runs with
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Handle a start-chat request for `username`.
    ///
    /// Resolution order, as one atomic critical section: already in a room
    /// (idempotent), join a waiting room, create a room under capacity, or
    /// fall back to the wait queue (also idempotent). Queueing is the
    /// universal fallback, so this cannot fail short of an internal
    /// invariant violation.
    pub async fn start_chat(&self, username: &str) -> Result<ChatStartResponse> {
        let start_time = Instant::now();

        let (response, outcome, event, room_count, waiting, depth) = {
            let mut queue = self.queue_write()?;
            let mut rooms = self.rooms_write()?;

            let (response, outcome, event) = if let Some(code) = rooms.room_code_of(username) {
                debug!(username, room = %code, "start chat: already in room");
                (
                    ChatStartResponse::room_assigned(code, "Already in room"),
                    StartOutcome::AlreadyInRoom,
                    None,
                )
            } else if let Some(room) = rooms.find_waiting_room_mut() {
                room.add_member(username);
                info!(username, room = %room.code, "start chat: joined waiting room");
                let event = ChatEvent::UserJoined {
                    room: room.code.clone(),
                    username: username.to_string(),
                    members: room.members.clone(),
                    timestamp: current_timestamp(),
                };
                (
                    ChatStartResponse::room_assigned(room.code.clone(), "Joined existing room"),
                    StartOutcome::JoinedWaiting,
                    Some(event),
                )
            } else if rooms.has_capacity() {
                let room = rooms.create_room(username);
                info!(username, room = %room.code, "start chat: created new room");
                let event = ChatEvent::RoomCreated {
                    room: room.code.clone(),
                    username: username.to_string(),
                    timestamp: current_timestamp(),
                };
                (
                    ChatStartResponse::room_assigned(room.code, "Created new room"),
                    StartOutcome::CreatedRoom,
                    Some(event),
                )
            } else {
                let existing = queue.position(username);
                if existing > 0 {
                    debug!(username, position = existing, "start chat: already queued");
                    (
                        ChatStartResponse::queued(existing, "Already in queue"),
                        StartOutcome::AlreadyQueued,
                        None,
                    )
                } else {
                    let position = queue.enqueue(username);
                    info!(username, position, "start chat: registry full, queued");
                    (
                        ChatStartResponse::queued(
                            position,
                            format!("Added to queue. Position: {}", position),
                        ),
                        StartOutcome::Queued,
                        None,
                    )
                }
            };

            (
                response,
                outcome,
                event,
                rooms.len(),
                rooms.waiting_count(),
                queue.len(),
            )
        };

        self.bump_stats(|stats| {
            stats.chats_started += 1;
            match outcome {
                StartOutcome::CreatedRoom => stats.rooms_created += 1,
                StartOutcome::Queued => stats.users_queued += 1,
                _ => {}
            }
            stats.active_rooms = room_count;
            stats.waiting_rooms = waiting;
            stats.queue_depth = depth;
        });

        match outcome {
            StartOutcome::CreatedRoom => self.metrics.record_room_created(),
            StartOutcome::Queued => self.metrics.record_user_queued(),
            _ => {}
        }
        self.metrics.update_room_occupancy(room_count, waiting);
        self.metrics.update_queue_depth(depth);
        self.metrics.record_start_chat(start_time.elapsed());

        if let Some(event) = event {
            self.publish(event).await;
        }

        Ok(response)
    }

    /// Validate and apply a join attempt from the transport layer.
    ///
    /// Fails with [`MatchmakingError::RoomNotFound`] for unknown codes and
    /// [`MatchmakingError::RoomFull`] when two distinct other users already
    /// occupy the room. Joining a room one is already in is a no-op success.
    pub async fn join_room(&self, room_code: &str, username: &str) -> Result<()> {
        let (event, room_count, waiting) = {
            let mut rooms = self.rooms_write()?;

            let event = {
                let room = rooms.get_mut(room_code).ok_or_else(|| {
                    MatchmakingError::RoomNotFound {
                        code: room_code.to_string(),
                    }
                })?;

                if room.has_member(username) {
                    debug!(username, room = room_code, "join room: already a member");
                    None
                } else if room.is_full() {
                    return Err(MatchmakingError::RoomFull {
                        code: room_code.to_string(),
                    }
                    .into());
                } else {
                    room.add_member(username);
                    info!(username, room = room_code, "join room: member added");
                    Some(ChatEvent::UserJoined {
                        room: room.code.clone(),
                        username: username.to_string(),
                        members: room.members.clone(),
                        timestamp: current_timestamp(),
                    })
                }
            };

            (event, rooms.len(), rooms.waiting_count())
        };

        self.bump_stats(|stats| {
            stats.active_rooms = room_count;
            stats.waiting_rooms = waiting;
        });
        self.metrics.update_room_occupancy(room_count, waiting);

        if let Some(event) = event {
            self.publish(event).await;
        }

        Ok(())
    }

    /// Remove `username` from a room, deleting the room when it empties.
    ///
    /// Deliberately total: a missing room or missing membership is a silent
    /// no-op, so a closing connection can always clean up unconditionally.
    pub async fn leave_room(&self, room_code: &str, username: &str) {
        let mut events = Vec::new();

        let occupancy = {
            let Ok(mut rooms) = self.rooms.write() else {
                warn!(room = room_code, "leave room: rooms lock poisoned, skipping cleanup");
                return;
            };

            let mut emptied = false;
            if let Some(room) = rooms.get_mut(room_code) {
                if room.remove_member(username) {
                    debug!(username, room = room_code, "leave room: member removed");
                    events.push(ChatEvent::UserLeft {
                        room: room.code.clone(),
                        username: username.to_string(),
                        remaining: room.members.clone(),
                        timestamp: current_timestamp(),
                    });
                    emptied = room.members.is_empty();
                }
            }

            if emptied {
                rooms.remove(room_code);
                info!(room = room_code, "room emptied and closed");
                events.push(ChatEvent::RoomClosed {
                    room: room_code.to_string(),
                    reason: RoomCloseReason::Emptied,
                    timestamp: current_timestamp(),
                });
            }

            (rooms.len(), rooms.waiting_count())
        };

        let (room_count, waiting) = occupancy;
        self.bump_stats(|stats| {
            stats.active_rooms = room_count;
            stats.waiting_rooms = waiting;
        });
        self.metrics.update_room_occupancy(room_count, waiting);

        for event in events {
            self.publish(event).await;
        }
    }

    /// Promotion sweep body: serve queued users in FIFO order, one pass.
    ///
    /// Each entry gets a waiting room if one exists, a fresh room if the
    /// registry has capacity, and otherwise stays queued for the next tick.
    /// Returns the number of users promoted. Driven periodically by
    /// [`crate::matchmaker::MaintenanceTasks`]; also callable directly.
    pub async fn run_promotion_sweep(&self) -> Result<usize> {
        let start_time = Instant::now();
        let mut events = Vec::new();

        let (promoted, created, room_count, waiting, depth) = {
            let mut queue = self.queue_write()?;
            let mut rooms = self.rooms_write()?;

            let mut promoted = 0usize;
            let mut created = 0usize;

            for entry in queue.snapshot() {
                let username = entry.username.as_str();

                // A user who re-requested while queued may already hold a
                // room; their entry is finished, not promotable.
                if rooms.room_code_of(username).is_some() {
                    queue.remove(username);
                    debug!(username, "promotion: already in a room, dropping entry");
                    continue;
                }

                if let Some(room) = rooms.find_waiting_room_mut() {
                    room.add_member(username);
                    let code = room.code.clone();
                    queue.remove(username);
                    promoted += 1;
                    info!(username, room = %code, "promoted into waiting room");
                    events.push(ChatEvent::UserPromoted {
                        room: code,
                        username: username.to_string(),
                        timestamp: current_timestamp(),
                    });
                } else if rooms.has_capacity() {
                    let room = rooms.create_room(username);
                    queue.remove(username);
                    promoted += 1;
                    created += 1;
                    info!(username, room = %room.code, "promoted into new room");
                    events.push(ChatEvent::RoomCreated {
                        room: room.code.clone(),
                        username: username.to_string(),
                        timestamp: current_timestamp(),
                    });
                    events.push(ChatEvent::UserPromoted {
                        room: room.code,
                        username: username.to_string(),
                        timestamp: current_timestamp(),
                    });
                }
                // else: no slot for this entry; keep scanning in FIFO order
            }

            (
                promoted,
                created,
                rooms.len(),
                rooms.waiting_count(),
                queue.len(),
            )
        };

        if promoted > 0 {
            info!(promoted, "promotion sweep assigned queued users");
        }

        self.bump_stats(|stats| {
            stats.users_promoted += promoted as u64;
            stats.rooms_created += created as u64;
            stats.active_rooms = room_count;
            stats.waiting_rooms = waiting;
            stats.queue_depth = depth;
        });
        self.metrics.record_promotions(promoted as u64);
        self.metrics.record_rooms_created(created as u64);
        self.metrics.update_room_occupancy(room_count, waiting);
        self.metrics.update_queue_depth(depth);
        self.metrics.record_sweep("promotion", start_time.elapsed());

        for event in events {
            self.publish(event).await;
        }

        Ok(promoted)
    }

    /// Queue expiry sweep body: drop entries older than the configured
    /// queue timeout. Returns the number of entries dropped.
    pub async fn run_queue_expiry(&self) -> Result<usize> {
        let start_time = Instant::now();

        let (expired, depth) = {
            let mut queue = self.queue_write()?;
            let expired = queue.remove_expired(self.settings.queue_timeout());
            (expired, queue.len())
        };

        if !expired.is_empty() {
            info!(count = expired.len(), "expired stale queue entries");
        }

        self.bump_stats(|stats| {
            stats.queue_expirations += expired.len() as u64;
            stats.queue_depth = depth;
        });
        self.metrics.record_queue_expirations(expired.len() as u64);
        self.metrics.update_queue_depth(depth);
        self.metrics.record_sweep("queue_expiry", start_time.elapsed());

        Ok(expired.len())
    }

    /// Lonely-room reaper body: delete rooms that have had exactly one
    /// member for at least the cleanup interval. Returns the number of
    /// rooms reaped.
    pub async fn run_room_reaper(&self) -> Result<usize> {
        let start_time = Instant::now();

        let (reaped, room_count, waiting) = {
            let mut rooms = self.rooms_write()?;
            let reaped = rooms.reap_lonely(self.settings.room_cleanup_threshold());
            (reaped, rooms.len(), rooms.waiting_count())
        };
        let reaped_count = reaped.len();

        for room in &reaped {
            info!(room = %room.code, "reaped lonely room");
        }

        self.bump_stats(|stats| {
            stats.rooms_reaped += reaped_count as u64;
            stats.active_rooms = room_count;
            stats.waiting_rooms = waiting;
        });
        self.metrics.record_rooms_reaped(reaped_count as u64);
        self.metrics.update_room_occupancy(room_count, waiting);
        self.metrics.record_sweep("room_reaper", start_time.elapsed());

        for room in reaped {
            self.publish(ChatEvent::RoomClosed {
                room: room.code,
                reason: RoomCloseReason::Reaped,
                timestamp: current_timestamp(),
            })
            .await;
        }

        Ok(reaped_count)
    }

    /// 1-based queue position of `username`, 0 when not queued
    pub async fn queue_position(&self, username: &str) -> Result<usize> {
        Ok(self.queue_read()?.position(username))
    }

    /// Current number of queued users
    pub async fn queue_size(&self) -> Result<usize> {
        Ok(self.queue_read()?.len())
    }

    /// Queue standing of `username`, for polling clients
    pub async fn queue_status(&self, username: &str) -> Result<QueueStatus> {
        let queue = self.queue_read()?;
        let position = queue.position(username);
        Ok(QueueStatus {
            in_queue: position > 0,
            position,
            queue_size: queue.len(),
        })
    }

    /// Defensive copy of the room with `code`, if live
    pub async fn get_room(&self, code: &str) -> Result<Option<Room>> {
        Ok(self.rooms_read()?.get(code).cloned())
    }

    /// Defensive copies of every room waiting for a partner
    pub async fn waiting_rooms(&self) -> Result<Vec<Room>> {
        Ok(self.rooms_read()?.waiting_rooms())
    }

    /// Current engine statistics
    pub fn stats(&self) -> Result<EngineStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "stats lock poisoned".to_string(),
            })?;
        Ok(stats.clone())
    }

    async fn publish(&self, event: ChatEvent) {
        if let Err(e) = self.event_publisher.publish(event).await {
            warn!("Failed to publish chat event: {:#}", e);
        }
    }

    /// Best-effort statistics update; a poisoned stats lock loses the
    /// update but never fails the operation.
    fn bump_stats<F: FnOnce(&mut EngineStats)>(&self, apply: F) {
        match self.stats.write() {
            Ok(mut stats) => apply(&mut stats),
            Err(_) => warn!("stats lock poisoned, dropping statistics update"),
        }
    }

    fn rooms_read(&self) -> Result<RwLockReadGuard<'_, RoomTable>> {
        self.rooms.read().map_err(|_| {
            MatchmakingError::InternalError {
                message: "rooms lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn rooms_write(&self) -> Result<RwLockWriteGuard<'_, RoomTable>> {
        self.rooms.write().map_err(|_| {
            MatchmakingError::InternalError {
                message: "rooms lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn queue_read(&self) -> Result<RwLockReadGuard<'_, WaitQueue>> {
        self.queue.read().map_err(|_| {
            MatchmakingError::InternalError {
                message: "queue lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn queue_write(&self) -> Result<RwLockWriteGuard<'_, WaitQueue>> {
        self.queue.write().map_err(|_| {
            MatchmakingError::InternalError {
                message: "queue lock poisoned".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchmaker::room::ROOM_CAPACITY;
    use chrono::Duration;

    fn test_settings(max_rooms: usize) -> ChatSettings {
        ChatSettings {
            max_rooms,
            queue_timeout_seconds: 120,
            room_cleanup_interval_seconds: 300,
            promotion_interval_seconds: 5,
            queue_sweep_interval_seconds: 30,
        }
    }

    fn test_engine(max_rooms: usize) -> MatchmakingEngine {
        MatchmakingEngine::new(test_settings(max_rooms))
    }

    #[tokio::test]
    async fn test_first_user_creates_room() {
        let engine = test_engine(10);

        let response = engine.start_chat("alice").await.unwrap();
        let code = response.room_code().expect("should be assigned").to_string();

        let room = engine.get_room(&code).await.unwrap().unwrap();
        assert_eq!(room.members, vec!["alice".to_string()]);
        assert!(room.is_waiting());
    }

    #[tokio::test]
    async fn test_second_user_joins_waiting_room() {
        let engine = test_engine(10);

        let first = engine.start_chat("alice").await.unwrap();
        let second = engine.start_chat("bob").await.unwrap();

        assert_eq!(first.room_code(), second.room_code());

        let room = engine
            .get_room(second.room_code().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(room.is_full());
        assert!(room.has_member("alice"));
        assert!(room.has_member("bob"));
    }

    #[tokio::test]
    async fn test_start_chat_is_idempotent() {
        let engine = test_engine(10);

        let first = engine.start_chat("alice").await.unwrap();
        let second = engine.start_chat("alice").await.unwrap();

        assert_eq!(first.room_code(), second.room_code());

        // no second room appeared, and alice is still alone in hers
        let room = engine
            .get_room(first.room_code().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(room.members.len(), 1);
        assert_eq!(engine.stats().unwrap().rooms_created, 1);
    }

    #[tokio::test]
    async fn test_registry_full_queues_with_fifo_positions() {
        let engine = test_engine(1);

        engine.start_chat("u1").await.unwrap(); // creates the only room
        engine.start_chat("u2").await.unwrap(); // fills it

        let third = engine.start_chat("u3").await.unwrap();
        assert_eq!(third.position(), Some(1));

        let fourth = engine.start_chat("u4").await.unwrap();
        assert_eq!(fourth.position(), Some(2));

        assert_eq!(engine.queue_position("u3").await.unwrap(), 1);
        assert_eq!(engine.queue_position("u4").await.unwrap(), 2);
        assert_eq!(engine.queue_size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_queued_start_chat_is_idempotent() {
        let engine = test_engine(1);

        engine.start_chat("u1").await.unwrap();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("u3").await.unwrap();

        let again = engine.start_chat("u3").await.unwrap();
        assert_eq!(again.position(), Some(1));
        assert_eq!(engine.queue_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_join_room_guards() {
        let engine = test_engine(10);

        let response = engine.start_chat("alice").await.unwrap();
        let code = response.room_code().unwrap().to_string();

        // unknown code
        let err = engine.join_room("ZZZZ2222", "bob").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::RoomNotFound { .. })
        ));

        // second member fits, a member re-joining is a no-op success
        engine.join_room(&code, "bob").await.unwrap();
        engine.join_room(&code, "bob").await.unwrap();

        // third distinct user is rejected
        let err = engine.join_room(&code, "carol").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::RoomFull { .. })
        ));

        let room = engine.get_room(&code).await.unwrap().unwrap();
        assert_eq!(room.members.len(), ROOM_CAPACITY);
    }

    #[tokio::test]
    async fn test_leave_room_deletes_empty_room() {
        let engine = test_engine(10);

        let response = engine.start_chat("alice").await.unwrap();
        let code = response.room_code().unwrap().to_string();
        engine.join_room(&code, "bob").await.unwrap();

        engine.leave_room(&code, "alice").await;
        let room = engine.get_room(&code).await.unwrap().unwrap();
        assert_eq!(room.members, vec!["bob".to_string()]);

        engine.leave_room(&code, "bob").await;
        assert!(engine.get_room(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leave_room_is_total() {
        let engine = test_engine(10);

        // unknown room and unknown member are both silent no-ops
        engine.leave_room("ZZZZ2222", "ghost").await;

        let response = engine.start_chat("alice").await.unwrap();
        let code = response.room_code().unwrap().to_string();
        engine.leave_room(&code, "ghost").await;

        assert!(engine.get_room(&code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_promotion_after_capacity_frees() {
        let engine = test_engine(1);

        let r = engine.start_chat("u1").await.unwrap();
        let code = r.room_code().unwrap().to_string();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("u3").await.unwrap();
        assert_eq!(engine.queue_position("u3").await.unwrap(), 1);

        // nothing to promote while the registry is full
        assert_eq!(engine.run_promotion_sweep().await.unwrap(), 0);
        assert_eq!(engine.queue_position("u3").await.unwrap(), 1);

        // both members leave; the room closes and capacity frees up
        engine.leave_room(&code, "u1").await;
        engine.leave_room(&code, "u2").await;

        let promoted = engine.run_promotion_sweep().await.unwrap();
        assert_eq!(promoted, 1);
        assert_eq!(engine.queue_position("u3").await.unwrap(), 0);

        let rooms = engine.waiting_rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert!(rooms[0].has_member("u3"));
    }

    #[tokio::test]
    async fn test_promotion_renumbers_queue() {
        let engine = test_engine(1);

        let r = engine.start_chat("u1").await.unwrap();
        let code = r.room_code().unwrap().to_string();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("a").await.unwrap();
        engine.start_chat("b").await.unwrap();
        engine.start_chat("c").await.unwrap();

        engine.leave_room(&code, "u1").await;
        engine.leave_room(&code, "u2").await;

        // one pass promotes the two earliest into the freed slot: "a" gets a
        // fresh room, "b" pairs into it, "c" stays queued at position 1
        let promoted = engine.run_promotion_sweep().await.unwrap();
        assert_eq!(promoted, 2);
        assert_eq!(engine.queue_position("a").await.unwrap(), 0);
        assert_eq!(engine.queue_position("b").await.unwrap(), 0);
        assert_eq!(engine.queue_position("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_promotion_drops_entries_for_roomed_users() {
        let engine = test_engine(2);

        // u3 queues while the registry is full, then lands a room after a
        // direct re-request when capacity opens
        let r1 = engine.start_chat("u1").await.unwrap();
        let code1 = r1.room_code().unwrap().to_string();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("u3").await.unwrap();
        engine.start_chat("u4").await.unwrap();
        engine.start_chat("q1").await.unwrap();
        assert_eq!(engine.queue_position("q1").await.unwrap(), 1);

        engine.leave_room(&code1, "u1").await;
        engine.leave_room(&code1, "u2").await;
        let re = engine.start_chat("q1").await.unwrap();
        assert!(re.room_code().is_some());

        // q1's stale queue entry is discarded, not promoted elsewhere
        let promoted = engine.run_promotion_sweep().await.unwrap();
        assert_eq!(promoted, 0);
        assert_eq!(engine.queue_position("q1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queue_expiry_drops_stale_entries() {
        let engine = test_engine(1);

        engine.start_chat("u1").await.unwrap();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("stale").await.unwrap();
        engine.start_chat("fresh").await.unwrap();

        // backdate the first entry past the queue timeout
        {
            let mut queue = engine.queue.write().unwrap();
            queue.remove("stale");
            queue.remove("fresh");
            queue.enqueue_at("stale", current_timestamp() - Duration::seconds(200));
            queue.enqueue("fresh");
        }

        let expired = engine.run_queue_expiry().await.unwrap();
        assert_eq!(expired, 1);
        assert_eq!(engine.queue_position("stale").await.unwrap(), 0);
        assert_eq!(engine.queue_position("fresh").await.unwrap(), 1);
        assert_eq!(engine.stats().unwrap().queue_expirations, 1);
    }

    #[tokio::test]
    async fn test_room_reaper_removes_stale_waiting_rooms() {
        let engine = test_engine(10);

        // alice and bob pair up; carol ends up alone in a second room
        let first = engine.start_chat("alice").await.unwrap();
        let paired_code = first.room_code().unwrap().to_string();
        let second = engine.start_chat("bob").await.unwrap();
        assert_eq!(second.room_code(), Some(paired_code.as_str()));

        let carol = engine.start_chat("carol").await.unwrap();
        let carol_code = carol.room_code().unwrap().to_string();

        // backdate both rooms past the cleanup threshold
        {
            let mut rooms = engine.rooms.write().unwrap();
            let backdated = current_timestamp() - Duration::seconds(600);
            rooms.get_mut(&paired_code).unwrap().updated_at = backdated;
            rooms.get_mut(&carol_code).unwrap().updated_at = backdated;
        }

        engine.run_room_reaper().await.unwrap();

        // the two-member room survives regardless of age
        assert!(engine.get_room(&paired_code).await.unwrap().is_some());
        assert!(engine.get_room(&carol_code).await.unwrap().is_none());
        assert_eq!(engine.stats().unwrap().rooms_reaped, 1);
    }

    #[tokio::test]
    async fn test_query_surface_returns_defensive_copies() {
        let engine = test_engine(10);

        let response = engine.start_chat("alice").await.unwrap();
        let code = response.room_code().unwrap().to_string();

        let mut copy = engine.get_room(&code).await.unwrap().unwrap();
        copy.members.push("intruder".to_string());

        let room = engine.get_room(&code).await.unwrap().unwrap();
        assert_eq!(room.members, vec!["alice".to_string()]);

        let mut listed = engine.waiting_rooms().await.unwrap();
        listed[0].members.clear();
        let room = engine.get_room(&code).await.unwrap().unwrap();
        assert_eq!(room.members.len(), 1);
    }

    #[tokio::test]
    async fn test_queue_status_projection() {
        let engine = test_engine(1);

        engine.start_chat("u1").await.unwrap();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("u3").await.unwrap();
        engine.start_chat("u4").await.unwrap();

        let status = engine.queue_status("u4").await.unwrap();
        assert!(status.in_queue);
        assert_eq!(status.position, 2);
        assert_eq!(status.queue_size, 2);

        let status = engine.queue_status("u1").await.unwrap();
        assert!(!status.in_queue);
        assert_eq!(status.position, 0);
        assert_eq!(status.queue_size, 2);
    }

    #[tokio::test]
    async fn test_stats_tracking() {
        let engine = test_engine(1);

        engine.start_chat("u1").await.unwrap();
        engine.start_chat("u2").await.unwrap();
        engine.start_chat("u3").await.unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.chats_started, 3);
        assert_eq!(stats.rooms_created, 1);
        assert_eq!(stats.users_queued, 1);
        assert_eq!(stats.active_rooms, 1);
        assert_eq!(stats.queue_depth, 1);
    }
}
