//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Room not found: {code}")]
    RoomNotFound { code: String },

    #[error("Room is full: {code}")]
    RoomFull { code: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Whether the caller can recover by re-requesting matchmaking.
    ///
    /// `RoomNotFound` means a stale room link; `RoomFull` means the caller
    /// lost a join race. Both are resolved by a fresh start-chat request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MatchmakingError::RoomNotFound { .. } | MatchmakingError::RoomFull { .. }
        )
    }
}
