//! Session State Management

use crate::network::{RoomCode, Timestamp};

/// A room we are currently polling
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// Room code for sharing
    pub room_code: RoomCode,
    /// Last server timestamp consumed from the room's log
    last_cursor: Timestamp,
    /// Identifies this activation; background loops of an older activation
    /// see a different value and exit
    generation: u64,
}

impl ActiveSession {
    pub fn new(room_code: RoomCode, generation: u64) -> Self {
        Self {
            room_code,
            last_cursor: Timestamp::ZERO,
            generation,
        }
    }

    pub fn cursor(&self) -> Timestamp {
        self.last_cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Move the cursor forward to `ts`. Never regresses; returns whether the
    /// cursor moved.
    pub fn advance_cursor(&mut self, ts: Timestamp) -> bool {
        if ts > self.last_cursor {
            self.last_cursor = ts;
            true
        } else {
            false
        }
    }
}

/// Where this client is in the session lifecycle
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// Not in any room
    #[default]
    Idle,
    /// Created the room; the only participant allowed to send transport commands
    Hosting(ActiveSession),
    /// Joined someone else's room
    Joined(ActiveSession),
}

impl SessionState {
    /// Check if we're polling a room (the `session_active` flag)
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    /// Check if we are the host
    pub fn is_host(&self) -> bool {
        matches!(self, SessionState::Hosting(_))
    }

    /// Get the active session if we're in one
    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Hosting(session) | SessionState::Joined(session) => Some(session),
            SessionState::Idle => None,
        }
    }

    /// Get mutable reference to the active session
    pub fn active_mut(&mut self) -> Option<&mut ActiveSession> {
        match self {
            SessionState::Hosting(session) | SessionState::Joined(session) => Some(session),
            SessionState::Idle => None,
        }
    }

    pub fn room_code(&self) -> Option<&RoomCode> {
        self.active().map(|s| &s.room_code)
    }

    /// Whether the active session belongs to `generation`
    pub fn is_generation(&self, generation: u64) -> bool {
        self.active()
            .map(|s| s.generation == generation)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode::parse("ABC123").unwrap()
    }

    #[test]
    fn test_cursor_never_regresses() {
        let mut session = ActiveSession::new(code(), 1);
        assert_eq!(session.cursor(), Timestamp::ZERO);

        assert!(session.advance_cursor(Timestamp::from_micros(50)));
        assert!(!session.advance_cursor(Timestamp::from_micros(20)));
        assert!(!session.advance_cursor(Timestamp::from_micros(50)));
        assert_eq!(session.cursor(), Timestamp::from_micros(50));
    }

    #[test]
    fn test_state_queries() {
        let idle = SessionState::Idle;
        assert!(!idle.is_active());
        assert!(!idle.is_host());
        assert!(idle.room_code().is_none());

        let hosting = SessionState::Hosting(ActiveSession::new(code(), 3));
        assert!(hosting.is_active());
        assert!(hosting.is_host());
        assert!(hosting.is_generation(3));
        assert!(!hosting.is_generation(4));

        let joined = SessionState::Joined(ActiveSession::new(code(), 4));
        assert!(joined.is_active());
        assert!(!joined.is_host());
        assert_eq!(joined.room_code(), Some(&code()));
    }
}
