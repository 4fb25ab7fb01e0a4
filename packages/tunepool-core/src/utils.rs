//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol_constants::MAX_ROOM_NAME_LEN;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Room Name Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Reasons a room name is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomNameError {
    Empty,
    TooLong,
    InvalidCharacter,
}

impl RoomNameError {
    /// Human-readable message for API responses.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Room name cannot be empty",
            Self::TooLong => "Room name is too long",
            Self::InvalidCharacter => {
                "Room name may only contain letters, digits, '-', '_' and spaces"
            }
        }
    }
}

impl std::fmt::Display for RoomNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Validates a room name and returns its trimmed form.
///
/// Room names appear in URL paths and WebSocket subscriptions, so they are
/// restricted to a conservative character set.
pub fn validate_room_name(name: &str) -> Result<&str, RoomNameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RoomNameError::Empty);
    }
    if trimmed.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(RoomNameError::TooLong);
    }
    let valid = trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ');
    if !valid {
        return Err(RoomNameError::InvalidCharacter);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn room_name_is_trimmed() {
        assert_eq!(validate_room_name("  friday-night "), Ok("friday-night"));
    }

    #[test]
    fn room_name_empty_rejected() {
        assert_eq!(validate_room_name("   "), Err(RoomNameError::Empty));
    }

    #[test]
    fn room_name_with_slash_rejected() {
        assert_eq!(
            validate_room_name("a/b"),
            Err(RoomNameError::InvalidCharacter)
        );
    }

    #[test]
    fn room_name_too_long_rejected() {
        let name = "x".repeat(MAX_ROOM_NAME_LEN + 1);
        assert_eq!(validate_room_name(&name), Err(RoomNameError::TooLong));
    }
}
