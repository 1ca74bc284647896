//! Playback collaborator interface

use super::compare::{LibraryReport, PlaylistOffer};
use super::protocol::TrackRef;

/// Local playback and UI hooks driven by relayed commands
///
/// Methods run on a blocking thread. All but
/// [`confirm_playlist_sync`](Self::confirm_playlist_sync) are invoked while
/// the applier holds the player lock, so they must not lock the
/// [`SharedPlayer`](super::SharedPlayer) themselves.
pub trait PlayerCallback: Send + Sync {
    fn play_local(&self, track: &TrackRef);
    fn pause_local(&self);
    fn unpause_local(&self);
    fn stop_local(&self);

    /// User-facing status line
    fn on_status(&self, text: &str);

    /// Ask the user whether to replace the local queue with `offer`. Runs
    /// with the player unlocked and may block on a dialog.
    fn confirm_playlist_sync(&self, offer: &PlaylistOffer) -> bool;

    fn on_library_comparison(&self, report: &LibraryReport);

    /// Queue was replaced by an accepted playlist sync
    fn on_queue_replaced(&self, _queue: &[TrackRef], _current_index: usize) {}
}
