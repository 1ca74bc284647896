//! Command Applier
//!
//! Interprets relayed commands against the local [`PlayerState`].
//!
//! The relay fans every command out to all pollers, the sender included, so
//! bulk operations are checked for self-echo before anything reaches the user:
//!
//! - `SyncPlaylist` whose tracks equal the current queue is dropped.
//! - `LibraryComparison` whose names match the local library exactly is not
//!   reported, though it is still answered when it is not a reply.
//!
//! Two separate paths answer with a library snapshot. `RequestLibrary` always
//! answers once. `LibraryComparison` answers once unless it is itself a reply.
//!
//! Playlist offers need the user's answer, which may take a while, so the
//! player lock is released around the confirmation (see
//! [`CommandApplier::apply_shared`]).

use tracing::{debug, info, warn};

use super::callback::PlayerCallback;
use super::compare::{LibraryReport, PlaylistOffer};
use super::player::{PlayerState, SharedPlayer};
use super::protocol::{Command, TrackRef};

/// Missing names shown in a playlist offer preview
pub const PLAYLIST_PREVIEW_LIMIT: usize = 10;

/// Exclusive names shown per side of a library comparison
pub const COMPARISON_SAMPLE_LIMIT: usize = 8;

/// Outgoing command the caller must send after applying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// A peer asked for our library
    LibraryRequested,
    /// A peer volunteered its library; we answer with ours
    ComparisonReceived,
}

impl Reply {
    /// The answer to send: our library snapshot, flagged as a reply
    pub fn to_command(self, player: &PlayerState) -> Command {
        Command::LibraryComparison {
            count: player.library().len(),
            filenames: player.library_basenames(),
            is_reply: true,
        }
    }
}

/// What is left to do after [`CommandApplier::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Reply(Reply),
    /// The user must accept or decline before the queue changes; finish with
    /// [`CommandApplier::resolve_offer`]
    NeedsConfirmation(PlaylistOffer),
}

#[derive(Debug, Clone)]
pub struct CommandApplier {
    pub playlist_preview_limit: usize,
    pub comparison_sample_limit: usize,
}

impl Default for CommandApplier {
    fn default() -> Self {
        Self {
            playlist_preview_limit: PLAYLIST_PREVIEW_LIMIT,
            comparison_sample_limit: COMPARISON_SAMPLE_LIMIT,
        }
    }
}

impl CommandApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one command to a shared player, asking about playlist offers
    /// with the lock released. Returns the reply to send, if any.
    pub fn apply_shared(
        &self,
        command: Command,
        player: &SharedPlayer,
        callback: &dyn PlayerCallback,
    ) -> Option<Command> {
        let offer = {
            let mut player = player.lock();
            match self.apply(command, &mut player, callback) {
                Outcome::Done => return None,
                Outcome::Reply(reply) => return Some(reply.to_command(&player)),
                Outcome::NeedsConfirmation(offer) => offer,
            }
        };

        let accepted = callback.confirm_playlist_sync(&offer);

        let mut player = player.lock();
        self.resolve_offer(offer, accepted, &mut player, callback);
        None
    }

    /// Apply one command. Callbacks run with `player` borrowed, except for the
    /// playlist confirmation, which is left to the caller.
    pub fn apply(
        &self,
        command: Command,
        player: &mut PlayerState,
        callback: &dyn PlayerCallback,
    ) -> Outcome {
        debug!("Applying '{}'", command.tag());

        match command {
            Command::Play { index } => {
                self.select(player, callback, index, "Playing");
                Outcome::Done
            }
            Command::Next { index } => {
                self.select(player, callback, index, "Skipped to");
                Outcome::Done
            }
            Command::Prev { index } => {
                self.select(player, callback, index, "Previous");
                Outcome::Done
            }
            Command::Pause => {
                player.set_paused(true);
                callback.pause_local();
                callback.on_status("Paused");
                Outcome::Done
            }
            Command::Unpause => {
                player.set_paused(false);
                callback.unpause_local();
                callback.on_status("Resumed");
                Outcome::Done
            }
            Command::Stop => {
                callback.stop_local();
                callback.on_status("Stopped");
                Outcome::Done
            }
            Command::SyncPlaylist {
                tracks,
                current_index,
            } => self.offer_playlist(player, tracks, current_index),
            Command::RequestLibrary => {
                info!("Library requested, answering with {} songs", player.library().len());
                Outcome::Reply(Reply::LibraryRequested)
            }
            Command::LibraryComparison {
                count,
                filenames,
                is_reply,
            } => {
                let report =
                    LibraryReport::compare(&player.library_basenames(), &filenames, count, is_reply);
                // Our own snapshot echoed back tells the user nothing
                if report.is_self_echo() {
                    debug!("Not reporting library comparison identical to our own");
                } else {
                    callback.on_library_comparison(&report);
                }
                if is_reply {
                    Outcome::Done
                } else {
                    Outcome::Reply(Reply::ComparisonReceived)
                }
            }
        }
    }

    fn select(
        &self,
        player: &mut PlayerState,
        callback: &dyn PlayerCallback,
        index: usize,
        verb: &str,
    ) {
        match player.select(index) {
            Some(track) => {
                callback.play_local(&track);
                callback.on_status(&format!("{}: {}", verb, track.basename()));
            }
            None => warn!(
                "Dropping {} to index {} (queue has {} tracks)",
                verb.to_lowercase(),
                index,
                player.queue().len()
            ),
        }
    }

    fn offer_playlist(
        &self,
        player: &PlayerState,
        tracks: Vec<TrackRef>,
        current_index: i64,
    ) -> Outcome {
        if tracks.as_slice() == player.queue() {
            debug!("Ignoring playlist identical to our queue");
            return Outcome::Done;
        }

        let offer = PlaylistOffer::new(tracks, current_index, &player.library_basenames());
        if !offer.is_fully_available() {
            warn!(
                "Offered playlist has {} songs missing from the library",
                offer.missing.len()
            );
        }
        Outcome::NeedsConfirmation(offer)
    }

    /// Adopt an offered playlist if the user accepted it
    pub fn resolve_offer(
        &self,
        offer: PlaylistOffer,
        accepted: bool,
        player: &mut PlayerState,
        callback: &dyn PlayerCallback,
    ) {
        if !accepted {
            info!("Playlist sync declined");
            return;
        }

        player.replace_queue(offer.tracks, offer.current_index);
        callback.on_queue_replaced(player.queue(), player.current_index());
        callback.on_status("Playlist synced successfully!");
        info!("Adopted playlist with {} songs", player.queue().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::new_shared_player;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        offers: Mutex<Vec<PlaylistOffer>>,
        reports: Mutex<Vec<LibraryReport>>,
        accept: bool,
    }

    impl Recorder {
        fn accepting() -> Self {
            Self {
                accept: true,
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl PlayerCallback for Recorder {
        fn play_local(&self, track: &TrackRef) {
            self.events.lock().push(format!("play {}", track));
        }
        fn pause_local(&self) {
            self.events.lock().push("pause".into());
        }
        fn unpause_local(&self) {
            self.events.lock().push("unpause".into());
        }
        fn stop_local(&self) {
            self.events.lock().push("stop".into());
        }
        fn on_status(&self, text: &str) {
            self.events.lock().push(format!("status {}", text));
        }
        fn confirm_playlist_sync(&self, offer: &PlaylistOffer) -> bool {
            self.offers.lock().push(offer.clone());
            self.accept
        }
        fn on_library_comparison(&self, report: &LibraryReport) {
            self.reports.lock().push(report.clone());
        }
    }

    fn tracks(names: &[&str]) -> Vec<TrackRef> {
        names.iter().map(|n| TrackRef::from(*n)).collect()
    }

    fn player_with_queue(names: &[&str]) -> PlayerState {
        let mut player = PlayerState::new();
        player.replace_queue(tracks(names), 0);
        player
    }

    fn comparison(names: &[&str], is_reply: bool) -> Command {
        Command::LibraryComparison {
            count: names.len(),
            filenames: names.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            is_reply,
        }
    }

    #[test]
    fn test_play_selects_track() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let mut player = player_with_queue(&["/m/a.mp3", "/m/b.mp3", "/m/c.mp3", "/m/d.mp3"]);

        let reply = applier.apply(Command::Play { index: 2 }, &mut player, &recorder);

        assert_eq!(reply, Outcome::Done);
        assert_eq!(player.current_index(), 2);
        assert_eq!(recorder.events(), vec!["play /m/c.mp3", "status Playing: c.mp3"]);
    }

    #[test]
    fn test_out_of_range_index_is_dropped() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let mut player = player_with_queue(&["a", "b"]);

        applier.apply(Command::Next { index: 5 }, &mut player, &recorder);
        applier.apply(Command::Play { index: 0 }, &mut PlayerState::new(), &recorder);

        assert_eq!(player.current_index(), 0);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_transport_statuses() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let mut player = player_with_queue(&["/a/x.mp3", "/a/y.mp3"]);

        applier.apply(Command::Pause, &mut player, &recorder);
        assert!(player.is_paused());
        applier.apply(Command::Unpause, &mut player, &recorder);
        assert!(!player.is_paused());
        applier.apply(Command::Prev { index: 1 }, &mut player, &recorder);
        applier.apply(Command::Stop, &mut player, &recorder);

        assert_eq!(
            recorder.events(),
            vec![
                "pause",
                "status Paused",
                "unpause",
                "status Resumed",
                "play /a/y.mp3",
                "status Previous: y.mp3",
                "stop",
                "status Stopped",
            ]
        );
    }

    #[test]
    fn test_identical_playlist_is_not_offered() {
        let applier = CommandApplier::new();
        let recorder = Recorder::accepting();
        let mut player = player_with_queue(&["a", "b"]);

        let cmd = Command::SyncPlaylist {
            tracks: tracks(&["a", "b"]),
            current_index: 1,
        };
        assert_eq!(applier.apply(cmd, &mut player, &recorder), Outcome::Done);

        assert!(recorder.offers.lock().is_empty());
        assert_eq!(player.current_index(), 0);
    }

    #[test]
    fn test_accepted_playlist_replaces_queue() {
        let applier = CommandApplier::new();
        let recorder = Recorder::accepting();
        let player = new_shared_player(PlayerState::with_library(tracks(&["/local/a.mp3"])));

        let cmd = Command::SyncPlaylist {
            tracks: tracks(&["/remote/a.mp3", "/remote/b.mp3"]),
            current_index: 9,
        };
        assert_eq!(applier.apply_shared(cmd, &player, &recorder), None);

        let offers = recorder.offers.lock().clone();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].missing, vec!["b.mp3"]);
        let player = player.lock();
        assert_eq!(player.queue(), tracks(&["/remote/a.mp3", "/remote/b.mp3"]).as_slice());
        assert_eq!(player.current_index(), 0);
        assert_eq!(recorder.events(), vec!["status Playlist synced successfully!"]);
    }

    #[test]
    fn test_offer_leaves_queue_until_resolved() {
        let applier = CommandApplier::new();
        let recorder = Recorder::accepting();
        let mut player = player_with_queue(&["mine"]);

        let cmd = Command::SyncPlaylist {
            tracks: tracks(&["theirs"]),
            current_index: 0,
        };
        let Outcome::NeedsConfirmation(offer) = applier.apply(cmd, &mut player, &recorder) else {
            panic!("expected a playlist offer");
        };
        assert_eq!(player.queue(), tracks(&["mine"]).as_slice());
        assert!(recorder.offers.lock().is_empty());

        applier.resolve_offer(offer, true, &mut player, &recorder);
        assert_eq!(player.queue(), tracks(&["theirs"]).as_slice());
    }

    /// Confirms by checking whether the player is free to lock
    struct LockCheck {
        player: SharedPlayer,
        was_free: Mutex<Option<bool>>,
    }

    impl PlayerCallback for LockCheck {
        fn play_local(&self, _track: &TrackRef) {}
        fn pause_local(&self) {}
        fn unpause_local(&self) {}
        fn stop_local(&self) {}
        fn on_status(&self, _text: &str) {}
        fn confirm_playlist_sync(&self, _offer: &PlaylistOffer) -> bool {
            *self.was_free.lock() = Some(self.player.try_lock().is_some());
            true
        }
        fn on_library_comparison(&self, _report: &LibraryReport) {}
    }

    #[test]
    fn test_confirmation_runs_without_player_lock() {
        let applier = CommandApplier::new();
        let player = new_shared_player(player_with_queue(&["mine"]));
        let callback = LockCheck {
            player: player.clone(),
            was_free: Mutex::new(None),
        };

        let cmd = Command::SyncPlaylist {
            tracks: tracks(&["theirs"]),
            current_index: 0,
        };
        applier.apply_shared(cmd, &player, &callback);

        assert_eq!(*callback.was_free.lock(), Some(true));
        assert_eq!(player.lock().queue(), tracks(&["theirs"]).as_slice());
    }

    #[test]
    fn test_declined_playlist_keeps_queue() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let player = new_shared_player(player_with_queue(&["mine"]));

        let cmd = Command::SyncPlaylist {
            tracks: tracks(&["theirs"]),
            current_index: 0,
        };
        applier.apply_shared(cmd, &player, &recorder);

        assert_eq!(recorder.offers.lock().len(), 1);
        assert_eq!(player.lock().queue(), tracks(&["mine"]).as_slice());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_request_library_always_replies() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let mut player = PlayerState::new();

        let reply = applier.apply(Command::RequestLibrary, &mut player, &recorder);
        assert_eq!(reply, Outcome::Reply(Reply::LibraryRequested));

        let answer = Reply::LibraryRequested.to_command(&player);
        assert_eq!(answer, comparison(&[], true));
    }

    #[test]
    fn test_comparison_replies_only_to_non_replies() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let mut player = PlayerState::with_library(tracks(&["/l/a.mp3", "/l/b.mp3"]));

        let reply = applier.apply(comparison(&["a.mp3", "c.mp3"], false), &mut player, &recorder);
        assert_eq!(reply, Outcome::Reply(Reply::ComparisonReceived));

        let reply = applier.apply(comparison(&["a.mp3", "c.mp3"], true), &mut player, &recorder);
        assert_eq!(reply, Outcome::Done);

        let reports = recorder.reports.lock().clone();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].only_local, vec!["b.mp3"]);
        assert_eq!(reports[0].only_remote, vec!["c.mp3"]);

        let answer = Reply::ComparisonReceived.to_command(&player);
        assert_eq!(answer, comparison(&["a.mp3", "b.mp3"], true));
    }

    #[test]
    fn test_identical_library_is_answered_but_not_reported() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let mut player = PlayerState::with_library(tracks(&["/l/a.mp3", "C:\\l\\b.mp3"]));

        let reply = applier.apply(comparison(&["a.mp3", "b.mp3"], false), &mut player, &recorder);
        assert_eq!(reply, Outcome::Reply(Reply::ComparisonReceived));

        let reply = applier.apply(comparison(&["a.mp3", "b.mp3"], true), &mut player, &recorder);
        assert_eq!(reply, Outcome::Done);

        assert!(recorder.reports.lock().is_empty());
    }

    #[test]
    fn test_apply_shared_builds_reply_command() {
        let applier = CommandApplier::new();
        let recorder = Recorder::default();
        let player = new_shared_player(PlayerState::with_library(tracks(&["/l/a.mp3"])));

        let reply = applier.apply_shared(Command::RequestLibrary, &player, &recorder);
        assert_eq!(reply, Some(comparison(&["a.mp3"], true)));
        assert_eq!(applier.apply_shared(Command::Stop, &player, &recorder), None);
    }
}
