//! Utility functions for the matchmaking service

use crate::types::RoomCode;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Alphabet for room codes: uppercase base32 (A-Z, 2-7), so codes survive
/// case-insensitive transports and avoid 0/O and 1/I confusion.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Length of generated room codes
pub const ROOM_CODE_LEN: usize = 8;

/// Generate a random room code
///
/// Uniqueness against live rooms is the registry's responsibility; this only
/// draws from the code space.
pub fn generate_room_code() -> RoomCode {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Check whether a string is a well-formed room code
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
