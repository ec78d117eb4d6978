//! FIFO wait queue for users without a room slot
//!
//! Order is significant: it defines promotion priority and the position
//! reported to polling clients. The queue is always mutated under the
//! engine's queue lock; the structure itself carries no synchronization.

use crate::types::Username;
use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A user waiting for a room slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub username: Username,
    /// Enqueue time, used for FIFO ordering and expiry
    pub queued_at: DateTime<Utc>,
}

/// Arrival-ordered wait queue, one entry per username
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<QueueEntry>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.entries.iter().any(|e| e.username == username)
    }

    /// 1-based position of `username`, or 0 when absent
    pub fn position(&self, username: &str) -> usize {
        self.entries
            .iter()
            .position(|e| e.username == username)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    /// Append `username` and return its 1-based position. Idempotent: an
    /// already-queued user keeps their entry and gets the existing position.
    pub fn enqueue(&mut self, username: &str) -> usize {
        self.enqueue_at(username, current_timestamp())
    }

    /// [`Self::enqueue`] with an explicit enqueue time
    pub fn enqueue_at(&mut self, username: &str, queued_at: DateTime<Utc>) -> usize {
        let existing = self.position(username);
        if existing > 0 {
            return existing;
        }

        self.entries.push_back(QueueEntry {
            username: username.to_string(),
            queued_at,
        });
        self.entries.len()
    }

    /// Remove and return the earliest entry
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Remove `username` wherever it sits, preserving the order of the rest.
    /// Returns whether an entry was removed.
    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.username != username);
        self.entries.len() != before
    }

    /// Drop every entry that has waited at least `ttl`, returning the dropped
    /// entries. Order of the survivors is preserved.
    pub fn remove_expired(&mut self, ttl: Duration) -> Vec<QueueEntry> {
        let now = current_timestamp();
        let mut expired = Vec::new();
        self.entries.retain(|e| {
            if now - e.queued_at >= ttl {
                expired.push(e.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Defensive copy of the current entries in FIFO order
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_positions_are_fifo() {
        let mut queue = WaitQueue::new();
        assert_eq!(queue.enqueue("alice"), 1);
        assert_eq!(queue.enqueue("bob"), 2);
        assert_eq!(queue.enqueue("carol"), 3);

        assert_eq!(queue.position("alice"), 1);
        assert_eq!(queue.position("bob"), 2);
        assert_eq!(queue.position("carol"), 3);
        assert_eq!(queue.position("dave"), 0);
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = WaitQueue::new();
        queue.enqueue("alice");
        queue.enqueue("bob");

        // re-enqueue keeps the original slot
        assert_eq!(queue.enqueue("alice"), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_positions_renumber_after_removal() {
        let mut queue = WaitQueue::new();
        queue.enqueue("alice");
        queue.enqueue("bob");
        queue.enqueue("carol");

        assert!(queue.remove("alice"));
        assert_eq!(queue.position("bob"), 1);
        assert_eq!(queue.position("carol"), 2);
        assert!(!queue.remove("alice"));
    }

    #[test]
    fn test_pop_front_serves_earliest() {
        let mut queue = WaitQueue::new();
        queue.enqueue("alice");
        queue.enqueue("bob");

        assert_eq!(queue.pop_front().unwrap().username, "alice");
        assert_eq!(queue.pop_front().unwrap().username, "bob");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_remove_expired_preserves_survivor_order() {
        let mut queue = WaitQueue::new();
        let now = current_timestamp();

        queue.enqueue_at("stale1", now - Duration::seconds(200));
        queue.enqueue_at("fresh1", now);
        queue.enqueue_at("stale2", now - Duration::seconds(150));
        queue.enqueue_at("fresh2", now);

        let expired = queue.remove_expired(Duration::seconds(120));
        let expired_names: Vec<_> = expired.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(expired_names, vec!["stale1", "stale2"]);

        assert_eq!(queue.position("fresh1"), 1);
        assert_eq!(queue.position("fresh2"), 2);
        assert_eq!(queue.position("stale1"), 0);
    }

    proptest! {
        /// Enqueuing distinct names yields positions 1..=n in arrival order.
        #[test]
        fn prop_positions_match_arrival_order(names in proptest::collection::hash_set("[a-z]{1,8}", 1..20)) {
            let names: Vec<String> = names.into_iter().collect();
            let mut queue = WaitQueue::new();
            for (idx, name) in names.iter().enumerate() {
                prop_assert_eq!(queue.enqueue(name), idx + 1);
            }
            for (idx, name) in names.iter().enumerate() {
                prop_assert_eq!(queue.position(name), idx + 1);
            }
            prop_assert_eq!(queue.len(), names.len());
        }
    }
}
