//! Session implementation for FFI

use std::sync::{Arc, Once};

use parking_lot::RwLock;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::library::LocalStore;
use crate::session::SessionClient;
use crate::sync::{
    new_shared_player, LibraryReport as InternalLibraryReport, PlayerCallback, PlayerState,
    PlaylistOffer as InternalPlaylistOffer, TrackRef,
};

use super::types::*;

static TRACING_INIT: Once = Once::new();

/// Forwards applier events to the native callback and persists adopted queues
struct CallbackBridge {
    callback: RwLock<Option<Arc<dyn SessionCallback>>>,
    store: Option<LocalStore>,
}

impl CallbackBridge {
    fn current(&self) -> Option<Arc<dyn SessionCallback>> {
        self.callback.read().clone()
    }
}

impl PlayerCallback for CallbackBridge {
    fn play_local(&self, track: &TrackRef) {
        if let Some(cb) = self.current() {
            cb.play_track(track.to_string());
        }
    }

    fn pause_local(&self) {
        if let Some(cb) = self.current() {
            cb.pause();
        }
    }

    fn unpause_local(&self) {
        if let Some(cb) = self.current() {
            cb.resume();
        }
    }

    fn stop_local(&self) {
        if let Some(cb) = self.current() {
            cb.stop();
        }
    }

    fn on_status(&self, text: &str) {
        debug!("Status: {}", text);
        if let Some(cb) = self.current() {
            cb.on_status(text.to_string());
        }
    }

    fn confirm_playlist_sync(&self, offer: &InternalPlaylistOffer) -> bool {
        // Without a UI nobody can accept
        self.current()
            .map(|cb| cb.confirm_playlist_sync(PlaylistOffer::from(offer)))
            .unwrap_or(false)
    }

    fn on_library_comparison(&self, report: &InternalLibraryReport) {
        if let Some(cb) = self.current() {
            cb.on_library_comparison(LibraryReport::from(report));
        }
    }

    fn on_queue_replaced(&self, queue: &[TrackRef], current_index: usize) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_queue(queue, current_index) {
                warn!("Failed to save synced playlist: {}", e);
            }
        }
        if let Some(cb) = self.current() {
            cb.on_queue_changed(
                queue.iter().map(|t| t.to_string()).collect(),
                current_index as u32,
            );
        }
    }
}

/// Main session interface
#[derive(uniffi::Object)]
pub struct Session {
    runtime: Runtime,
    client: SessionClient,
    bridge: Arc<CallbackBridge>,
    store: Option<LocalStore>,
}

#[uniffi::export]
impl Session {
    /// Create a new session. `relay_url` overrides the configured relay;
    /// `data_dir` enables loading and saving the library and queue.
    #[uniffi::constructor]
    pub fn new(relay_url: Option<String>, data_dir: Option<String>) -> Self {
        // Initialize tracing once
        TRACING_INIT.call_once(|| {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("jamroom_core=debug,hyper_util=off,hyper=off,reqwest=off")
            });
            let _ = tracing_subscriber::fmt()
                .with_ansi(false) // Disable colors for Xcode console
                .with_target(false)
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        });

        info!("Initializing jamroom-core session");

        let runtime = Runtime::new().expect("Failed to create tokio runtime");

        let mut config = SessionConfig::from_env();
        if let Some(url) = relay_url.filter(|u| !u.trim().is_empty()) {
            config = config.with_relay_url(url.trim());
        }

        let store = data_dir.map(LocalStore::new);
        let mut player = PlayerState::new();
        if let Some(store) = &store {
            player.set_library(store.load_library());
            let queue = store.load_queue();
            player.replace_queue(queue.playlist, queue.current_index as i64);
            info!(
                "Loaded {} library songs and {} queued from {}",
                player.library().len(),
                player.queue().len(),
                store.root().display()
            );
        }

        let bridge = Arc::new(CallbackBridge {
            callback: RwLock::new(None),
            store: store.clone(),
        });
        let client = SessionClient::new(config, new_shared_player(player), bridge.clone());

        Self {
            runtime,
            client,
            bridge,
            store,
        }
    }

    /// Set the event callback
    pub fn set_callback(&self, callback: Box<dyn SessionCallback>) {
        *self.bridge.callback.write() = Some(Arc::from(callback));
    }

    /// Create a new room (become host). Returns the room code.
    pub fn host_session(&self) -> Result<String, CoreError> {
        let code = self.runtime.block_on(self.client.host())?;
        Ok(code.to_string())
    }

    /// Join an existing room. Returns the normalized room code.
    pub fn join_session(&self, room_code: String) -> Result<String, CoreError> {
        let code = self.runtime.block_on(self.client.join(&room_code))?;
        Ok(code.to_string())
    }

    /// Leave the current room
    pub fn leave_session(&self) -> Result<(), CoreError> {
        Ok(self.client.leave()?)
    }

    // Transport commands return false when we are not the host and nothing
    // was relayed; the UI then plays locally only.

    pub fn send_play(&self, index: u32) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.play(index as usize))?)
    }

    pub fn send_pause(&self) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.pause())?)
    }

    pub fn send_unpause(&self) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.unpause())?)
    }

    pub fn send_stop(&self) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.stop())?)
    }

    pub fn send_next(&self, index: u32) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.next(index as usize))?)
    }

    pub fn send_prev(&self, index: u32) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.prev(index as usize))?)
    }

    /// Host: relay a skip to the next track (wrapping)
    pub fn skip_next(&self) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.skip_forward())?)
    }

    /// Host: relay a skip to the previous track (wrapping)
    pub fn skip_prev(&self) -> Result<bool, CoreError> {
        Ok(self.runtime.block_on(self.client.skip_back())?)
    }

    /// Offer the current queue to the room
    pub fn share_playlist(&self) -> Result<(), CoreError> {
        Ok(self.runtime.block_on(self.client.share_playlist())?)
    }

    /// Ask everyone in the room for a library comparison
    pub fn compare_libraries(&self) -> Result<(), CoreError> {
        Ok(self.runtime.block_on(self.client.request_library())?)
    }

    /// Wake a sleeping relay. Returns the round-trip time in milliseconds.
    pub fn wake_relay(&self) -> Result<u64, CoreError> {
        let rtt = self.runtime.block_on(self.client.wake_relay())?;
        Ok(rtt.as_millis() as u64)
    }

    pub fn get_session_info(&self) -> SessionInfo {
        SessionInfo::new(
            &self.client.state(),
            self.client.consecutive_errors(),
            self.client.is_degraded(),
            self.client.average_rtt_ms(),
        )
    }

    pub fn is_host(&self) -> bool {
        self.client.is_host()
    }

    pub fn is_in_session(&self) -> bool {
        self.client.is_active()
    }

    // =========================================================================
    // Local state
    // =========================================================================

    pub fn get_queue(&self) -> Vec<String> {
        let player = self.client.player().lock();
        player.queue().iter().map(|t| t.to_string()).collect()
    }

    pub fn get_current_index(&self) -> u32 {
        self.client.player().lock().current_index() as u32
    }

    /// Replace the queue (and save it when a data directory is set)
    pub fn set_queue(&self, tracks: Vec<String>, current_index: u32) -> Result<(), CoreError> {
        let (queue, index) = {
            let mut player = self.client.player().lock();
            player.replace_queue(
                tracks.into_iter().map(TrackRef::from).collect(),
                current_index as i64,
            );
            (player.queue().to_vec(), player.current_index())
        };
        self.persist_queue(&queue, index)
    }

    pub fn get_current_track(&self) -> Option<String> {
        let player = self.client.player().lock();
        player.current_track().map(|t| t.to_string())
    }

    pub fn is_paused(&self) -> bool {
        self.client.player().lock().is_paused()
    }

    /// Append a track unless it is already queued. Returns whether it was added.
    pub fn enqueue(&self, track: String) -> Result<bool, CoreError> {
        let snapshot = {
            let mut player = self.client.player().lock();
            player
                .enqueue(TrackRef::from(track))
                .then(|| (player.queue().to_vec(), player.current_index()))
        };
        let Some((queue, index)) = snapshot else {
            return Ok(false);
        };
        self.persist_queue(&queue, index)?;
        Ok(true)
    }

    /// Remove the queue entry at `index`. Returns false if out of range.
    pub fn remove_from_queue(&self, index: u32) -> Result<bool, CoreError> {
        let snapshot = {
            let mut player = self.client.player().lock();
            player
                .remove_from_queue(index as usize)
                .map(|_| (player.queue().to_vec(), player.current_index()))
        };
        let Some((queue, index)) = snapshot else {
            return Ok(false);
        };
        self.persist_queue(&queue, index)?;
        Ok(true)
    }

    pub fn get_library(&self) -> Vec<String> {
        let player = self.client.player().lock();
        player.library().iter().map(|t| t.to_string()).collect()
    }

    /// Add songs to the library, skipping duplicates. Returns how many were added.
    pub fn add_to_library(&self, tracks: Vec<String>) -> Result<u32, CoreError> {
        let (added, library) = {
            let mut player = self.client.player().lock();
            let added = player.add_to_library(tracks.into_iter().map(TrackRef::from));
            (added, player.library().to_vec())
        };
        if added > 0 {
            if let Some(store) = &self.store {
                store.save_library(&library)?;
            }
        }
        Ok(added as u32)
    }

    pub fn get_volume(&self) -> f32 {
        self.store
            .as_ref()
            .map(LocalStore::load_volume)
            .unwrap_or(crate::library::DEFAULT_VOLUME)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), CoreError> {
        if let Some(store) = &self.store {
            store.save_volume(volume)?;
        }
        Ok(())
    }

    pub fn list_playlists(&self) -> Vec<String> {
        self.store
            .as_ref()
            .map(LocalStore::list_playlists)
            .unwrap_or_default()
    }

    /// Save the current queue under `name`
    pub fn save_playlist(&self, name: String) -> Result<(), CoreError> {
        let Some(store) = &self.store else {
            return Err(CoreError::StorageError("No data directory configured".to_string()));
        };
        let queue = self.client.player().lock().queue().to_vec();
        store.save_playlist(&name, &queue)?;
        Ok(())
    }

    /// Replace the queue with a saved playlist. Returns false if none exists.
    pub fn load_playlist(&self, name: String) -> Result<bool, CoreError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let Some(playlist) = store.load_playlist(&name)? else {
            return Ok(false);
        };
        let songs: Vec<String> = playlist.songs.iter().map(|t| t.to_string()).collect();
        self.set_queue(songs, 0)?;
        Ok(true)
    }

    pub fn delete_playlist(&self, name: String) -> Result<bool, CoreError> {
        match &self.store {
            Some(store) => Ok(store.delete_playlist(&name)?),
            None => Ok(false),
        }
    }
}

impl Session {
    fn persist_queue(&self, queue: &[TrackRef], index: usize) -> Result<(), CoreError> {
        if let Some(store) = &self.store {
            store.save_queue(queue, index)?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Background loops live on our runtime; stop them before it shuts down
        let _ = self.client.leave();
    }
}
