//! FFI types exposed via uniffi

use crate::library::StorageError;
use crate::session::SessionError;
use crate::sync::{LibraryReport as InternalLibraryReport, PlaylistOffer as InternalPlaylistOffer};
use crate::sync::{SessionState, COMPARISON_SAMPLE_LIMIT, PLAYLIST_PREVIEW_LIMIT};

/// Error types exposed via FFI
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CoreError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Relay did not respond in time")]
    Timeout,

    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Not in a room")]
    NotInRoom,

    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("{0}")]
    NothingToShare(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<SessionError> for CoreError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::AlreadyInRoom => CoreError::AlreadyInRoom,
            SessionError::NotInRoom => CoreError::NotInRoom,
            SessionError::RoomNotFound(code) => CoreError::RoomNotFound(code),
            SessionError::EmptyQueue | SessionError::EmptyLibrary => {
                CoreError::NothingToShare(e.to_string())
            }
            SessionError::Relay(crate::network::RelayError::Timeout) => CoreError::Timeout,
            SessionError::Relay(e) => CoreError::NetworkError(e.to_string()),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        CoreError::StorageError(e.to_string())
    }
}

/// Session role exposed via FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum SessionRole {
    Idle,
    Host,
    Listener,
}

/// Session state exposed via FFI
#[derive(Debug, Clone, uniffi::Record)]
pub struct SessionInfo {
    pub role: SessionRole,
    pub room_code: Option<String>,
    /// Consecutive failed polls
    pub consecutive_errors: u32,
    /// Failures reached the warning threshold
    pub degraded: bool,
    /// Average keep-alive round trip, once measured
    pub relay_rtt_ms: Option<u64>,
}

impl SessionInfo {
    pub(crate) fn new(
        state: &SessionState,
        consecutive_errors: u32,
        degraded: bool,
        relay_rtt_ms: Option<u64>,
    ) -> Self {
        let role = match state {
            SessionState::Idle => SessionRole::Idle,
            SessionState::Hosting(_) => SessionRole::Host,
            SessionState::Joined(_) => SessionRole::Listener,
        };
        Self {
            role,
            room_code: state.room_code().map(|c| c.to_string()),
            consecutive_errors,
            degraded,
            relay_rtt_ms,
        }
    }
}

/// Playlist offer exposed via FFI
#[derive(Debug, Clone, uniffi::Record)]
pub struct PlaylistOffer {
    pub tracks: Vec<String>,
    pub current_index: i64,
    pub missing: Vec<String>,
    /// Ready-made confirmation text
    pub preview: String,
}

impl From<&InternalPlaylistOffer> for PlaylistOffer {
    fn from(o: &InternalPlaylistOffer) -> Self {
        Self {
            tracks: o.tracks.iter().map(|t| t.to_string()).collect(),
            current_index: o.current_index,
            missing: o.missing.clone(),
            preview: o.preview(PLAYLIST_PREVIEW_LIMIT),
        }
    }
}

/// Library comparison exposed via FFI
#[derive(Debug, Clone, uniffi::Record)]
pub struct LibraryReport {
    pub local_count: u64,
    pub remote_count: u64,
    pub common: u64,
    pub local_percent: u32,
    pub remote_percent: u32,
    pub only_local: Vec<String>,
    pub only_remote: Vec<String>,
    pub is_reply: bool,
    pub summary: String,
}

impl From<&InternalLibraryReport> for LibraryReport {
    fn from(r: &InternalLibraryReport) -> Self {
        Self {
            local_count: r.local_count as u64,
            remote_count: r.remote_count as u64,
            common: r.common as u64,
            local_percent: r.local_percent() as u32,
            remote_percent: r.remote_percent() as u32,
            only_local: r.only_local.clone(),
            only_remote: r.only_remote.clone(),
            is_reply: r.is_reply,
            summary: r.summary(COMPARISON_SAMPLE_LIMIT),
        }
    }
}

/// Callback interface for session events
///
/// Playback methods run on a background thread; `confirm_playlist_sync` may
/// block until the user answers; the session state getters stay usable while
/// it does.
#[uniffi::export(callback_interface)]
pub trait SessionCallback: Send + Sync {
    fn play_track(&self, track: String);
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    fn on_status(&self, message: String);
    fn confirm_playlist_sync(&self, offer: PlaylistOffer) -> bool;
    fn on_library_comparison(&self, report: LibraryReport);
    fn on_queue_changed(&self, queue: Vec<String>, current_index: u32);
}
