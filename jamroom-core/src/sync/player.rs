//! Local player state

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::protocol::TrackRef;

/// Queue, position and library of one application instance
///
/// Owned by the controller; the command applier and the UI layer both work on
/// it through [`SharedPlayer`].
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    queue: Vec<TrackRef>,
    current_index: usize,
    paused: bool,
    library: Vec<TrackRef>,
}

/// Thread-safe handle to the player state
pub type SharedPlayer = Arc<Mutex<PlayerState>>;

/// Create a new shared player state
pub fn new_shared_player(state: PlayerState) -> SharedPlayer {
    Arc::new(Mutex::new(state))
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(library: Vec<TrackRef>) -> Self {
        Self {
            library,
            ..Self::default()
        }
    }

    pub fn queue(&self) -> &[TrackRef] {
        &self.queue
    }

    pub fn library(&self) -> &[TrackRef] {
        &self.library
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Track at the current position, if the queue is non-empty
    pub fn current_track(&self) -> Option<&TrackRef> {
        self.queue.get(self.current_index)
    }

    /// Move to `index` and un-pause. Returns the selected track, or `None`
    /// (state unchanged) when `index` is outside the queue.
    pub fn select(&mut self, index: usize) -> Option<TrackRef> {
        let track = self.queue.get(index)?.clone();
        self.current_index = index;
        self.paused = false;
        Some(track)
    }

    /// Replace the queue. An out-of-range `index` (or an empty queue) resets
    /// the position to 0.
    pub fn replace_queue(&mut self, tracks: Vec<TrackRef>, index: i64) {
        self.current_index = usize::try_from(index)
            .ok()
            .filter(|i| *i < tracks.len())
            .unwrap_or(0);
        self.queue = tracks;
    }

    /// Add a track to the end of the queue unless it is already queued.
    /// Returns whether the queue changed.
    pub fn enqueue(&mut self, track: TrackRef) -> bool {
        if self.queue.contains(&track) {
            return false;
        }
        self.queue.push(track);
        true
    }

    /// Remove the queue entry at `index`, keeping the current position on the
    /// same track where possible
    pub fn remove_from_queue(&mut self, index: usize) -> Option<TrackRef> {
        if index >= self.queue.len() {
            return None;
        }
        let removed = self.queue.remove(index);
        if index < self.current_index {
            self.current_index -= 1;
        }
        if self.current_index >= self.queue.len() {
            self.current_index = 0;
        }
        Some(removed)
    }

    pub fn set_library(&mut self, library: Vec<TrackRef>) {
        self.library = library;
    }

    /// Add tracks to the library, skipping ones already present.
    /// Returns how many were added.
    pub fn add_to_library(&mut self, tracks: impl IntoIterator<Item = TrackRef>) -> usize {
        let mut added = 0;
        for track in tracks {
            if !self.library.contains(&track) {
                self.library.push(track);
                added += 1;
            }
        }
        added
    }

    /// Basenames of every library track
    pub fn library_basenames(&self) -> BTreeSet<String> {
        self.library
            .iter()
            .map(|t| t.basename().to_string())
            .collect()
    }

    /// Position after the current one, wrapping around
    pub fn next_index(&self) -> Option<usize> {
        if self.queue.is_empty() {
            return None;
        }
        Some((self.current_index + 1) % self.queue.len())
    }

    /// Position before the current one, wrapping around
    pub fn prev_index(&self) -> Option<usize> {
        if self.queue.is_empty() {
            return None;
        }
        let len = self.queue.len();
        Some((self.current_index + len - 1) % len)
    }
}
