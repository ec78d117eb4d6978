//! Room model and registry table
//!
//! A room pairs at most two users. The registry table maps room codes to
//! rooms and is always mutated under the engine's rooms lock; the table
//! itself carries no synchronization.

use crate::types::{RoomCode, Username};
use crate::utils::{current_timestamp, generate_room_code};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum members per room; chats are strictly 1:1
pub const ROOM_CAPACITY: usize = 2;

/// Draws from the code space before giving up. The space holds 32^8 codes,
/// so exhausting this budget means the generator or registry is broken.
const MAX_CODE_ATTEMPTS: usize = 64;

/// A chat room holding up to two users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Short unique code, immutable for the room's lifetime
    pub code: RoomCode,
    /// Insertion-ordered members, duplicate-free, at most [`ROOM_CAPACITY`]
    pub members: Vec<Username>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every membership change
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(code: RoomCode, initial_user: &str) -> Self {
        let now = current_timestamp();
        Self {
            code,
            members: vec![initial_user.to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    /// A room with exactly one member is waiting for a partner
    pub fn is_waiting(&self) -> bool {
        self.members.len() == 1
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }

    /// Add a member; no-op when already present or full. Returns whether the
    /// membership changed.
    pub fn add_member(&mut self, username: &str) -> bool {
        if self.has_member(username) || self.is_full() {
            return false;
        }
        self.members.push(username.to_string());
        self.updated_at = current_timestamp();
        true
    }

    /// Remove a member if present. Returns whether the membership changed.
    pub fn remove_member(&mut self, username: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != username);
        if self.members.len() != before {
            self.updated_at = current_timestamp();
            true
        } else {
            false
        }
    }
}

/// Registry table of active rooms, bounded by `max_rooms`
#[derive(Debug)]
pub struct RoomTable {
    rooms: HashMap<RoomCode, Room>,
    max_rooms: usize,
}

impl RoomTable {
    pub fn new(max_rooms: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_rooms,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Whether a new room may still be created
    pub fn has_capacity(&self) -> bool {
        self.rooms.len() < self.max_rooms
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    pub fn remove(&mut self, code: &str) -> Option<Room> {
        self.rooms.remove(code)
    }

    /// Create a room with `initial_user` as sole member.
    ///
    /// The caller is responsible for checking [`Self::has_capacity`] first.
    /// Panics if the code space cannot yield an unused code within the
    /// attempt budget; that indicates a misconfigured code space, not a
    /// recoverable condition.
    pub fn create_room(&mut self, initial_user: &str) -> Room {
        let code = self.unique_code();
        let room = Room::new(code.clone(), initial_user);
        self.rooms.insert(code, room.clone());
        room
    }

    fn unique_code(&self) -> RoomCode {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
        panic!(
            "room code space exhausted after {} attempts ({} rooms live)",
            MAX_CODE_ATTEMPTS,
            self.rooms.len()
        );
    }

    /// Code of the room `username` belongs to, if any. Linear scan.
    pub fn room_code_of(&self, username: &str) -> Option<RoomCode> {
        self.rooms
            .values()
            .find(|room| room.has_member(username))
            .map(|room| room.code.clone())
    }

    /// Some room with exactly one member, in arbitrary iteration order.
    /// Callers must not rely on which waiting room is returned.
    pub fn find_waiting_room_mut(&mut self) -> Option<&mut Room> {
        self.rooms.values_mut().find(|room| room.is_waiting())
    }

    /// Defensive copies of every waiting room
    pub fn waiting_rooms(&self) -> Vec<Room> {
        self.rooms
            .values()
            .filter(|room| room.is_waiting())
            .cloned()
            .collect()
    }

    pub fn waiting_count(&self) -> usize {
        self.rooms.values().filter(|room| room.is_waiting()).count()
    }

    /// Remove every room that has sat with exactly one member for at least
    /// `threshold`, returning the removed rooms.
    pub fn reap_lonely(&mut self, threshold: Duration) -> Vec<Room> {
        let now = current_timestamp();
        let stale: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| room.is_waiting() && now - room.updated_at >= threshold)
            .map(|room| room.code.clone())
            .collect();

        stale
            .iter()
            .filter_map(|code| self.rooms.remove(code))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_valid_room_code;

    #[test]
    fn test_room_lifecycle_predicates() {
        let mut room = Room::new("ABCD2345".to_string(), "alice");
        assert!(room.is_waiting());
        assert!(!room.is_full());
        assert!(room.has_member("alice"));

        assert!(room.add_member("bob"));
        assert!(room.is_full());
        assert!(!room.is_waiting());

        // full room rejects a third member
        assert!(!room.add_member("carol"));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let mut room = Room::new("ABCD2345".to_string(), "alice");
        let updated_before = room.updated_at;
        assert!(!room.add_member("alice"));
        assert_eq!(room.members, vec!["alice".to_string()]);
        // no-op must not bump the activity timestamp
        assert_eq!(room.updated_at, updated_before);
    }

    #[test]
    fn test_remove_member_bumps_updated_at() {
        let mut room = Room::new("ABCD2345".to_string(), "alice");
        room.add_member("bob");
        let updated_before = room.updated_at;

        assert!(room.remove_member("bob"));
        assert!(room.updated_at >= updated_before);
        assert!(!room.remove_member("bob"));
    }

    #[test]
    fn test_create_room_generates_unique_valid_codes() {
        let mut table = RoomTable::new(50);
        let mut codes = std::collections::HashSet::new();
        for i in 0..50 {
            let room = table.create_room(&format!("user{}", i));
            assert!(is_valid_room_code(&room.code));
            assert!(codes.insert(room.code.clone()), "duplicate code generated");
        }
        assert_eq!(table.len(), 50);
    }

    #[test]
    fn test_capacity_check() {
        let mut table = RoomTable::new(2);
        assert!(table.has_capacity());
        table.create_room("alice");
        table.create_room("bob");
        assert!(!table.has_capacity());
    }

    #[test]
    fn test_room_code_of_scans_membership() {
        let mut table = RoomTable::new(10);
        let room = table.create_room("alice");
        table.get_mut(&room.code).unwrap().add_member("bob");

        assert_eq!(table.room_code_of("alice"), Some(room.code.clone()));
        assert_eq!(table.room_code_of("bob"), Some(room.code));
        assert_eq!(table.room_code_of("carol"), None);
    }

    #[test]
    fn test_find_waiting_room_skips_full_rooms() {
        let mut table = RoomTable::new(10);
        let full = table.create_room("alice");
        table.get_mut(&full.code).unwrap().add_member("bob");

        assert!(table.find_waiting_room_mut().is_none());

        let waiting = table.create_room("carol");
        let found = table.find_waiting_room_mut().unwrap();
        assert_eq!(found.code, waiting.code);
    }

    #[test]
    fn test_reap_lonely_spares_pairs_and_fresh_rooms() {
        let mut table = RoomTable::new(10);

        let paired = table.create_room("alice");
        table.get_mut(&paired.code).unwrap().add_member("bob");

        let fresh = table.create_room("carol");

        let stale = table.create_room("dave");
        table.get_mut(&stale.code).unwrap().updated_at =
            current_timestamp() - Duration::seconds(600);

        let reaped = table.reap_lonely(Duration::seconds(300));
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].code, stale.code);

        // old but paired rooms are never reaped
        table.get_mut(&paired.code).unwrap().updated_at =
            current_timestamp() - Duration::seconds(600);
        assert!(table.reap_lonely(Duration::seconds(300)).is_empty());
        assert!(table.get(&paired.code).is_some());
        assert!(table.get(&fresh.code).is_some());
    }
}
