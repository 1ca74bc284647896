//! Session Client
//!
//! Hosts or joins a relay room, relays local actions, and polls the room's
//! command log, feeding every new command to the [`CommandApplier`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::health::ConnectionHealth;
use crate::network::{RelayClient, RelayError, RelayedCommand, RoomCode, Timestamp};
use crate::sync::{
    ActiveSession, Command, CommandApplier, PlayerCallback, SessionState, SharedPlayer,
};

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    #[error("No songs in queue to share")]
    EmptyQueue,

    #[error("Your library is empty")]
    EmptyLibrary,

    #[error(transparent)]
    Relay(RelayError),
}

impl From<RelayError> for SessionError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::RoomNotFound(code) => SessionError::RoomNotFound(code.to_string()),
            other => SessionError::Relay(other),
        }
    }
}

struct Inner {
    config: SessionConfig,
    relay: RelayClient,
    player: SharedPlayer,
    callback: Arc<dyn PlayerCallback>,
    applier: CommandApplier,
    state: RwLock<SessionState>,
    health: Mutex<ConnectionHealth>,
    next_generation: AtomicU64,
    /// Serializes polls so commands are applied one batch at a time
    poll_lock: tokio::sync::Mutex<()>,
    poll_cancel: Mutex<Option<oneshot::Sender<()>>>,
    keep_alive_cancel: Mutex<Option<oneshot::Sender<()>>>,
}

/// Per-application-instance relay session
///
/// Cheap to clone; clones share one session. Methods must be called from
/// within a tokio runtime because the background loops are spawned on it.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(
        config: SessionConfig,
        player: SharedPlayer,
        callback: Arc<dyn PlayerCallback>,
    ) -> Self {
        let relay = RelayClient::new(&config);
        let health = ConnectionHealth::new(config.max_consecutive_errors);
        Self {
            inner: Arc::new(Inner {
                config,
                relay,
                player,
                callback,
                applier: CommandApplier::new(),
                state: RwLock::new(SessionState::Idle),
                health: Mutex::new(health),
                next_generation: AtomicU64::new(1),
                poll_lock: tokio::sync::Mutex::new(()),
                poll_cancel: Mutex::new(None),
                keep_alive_cancel: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn player(&self) -> &SharedPlayer {
        &self.inner.player
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn room_code(&self) -> Option<RoomCode> {
        self.inner.state.read().room_code().cloned()
    }

    pub fn is_host(&self) -> bool {
        self.inner.state.read().is_host()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.read().is_active()
    }

    /// Last server timestamp consumed, if in a room
    pub fn cursor(&self) -> Option<Timestamp> {
        self.inner.state.read().active().map(ActiveSession::cursor)
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.inner.health.lock().consecutive_errors()
    }

    /// Consecutive poll failures have reached the configured threshold
    pub fn is_degraded(&self) -> bool {
        self.inner.health.lock().is_degraded()
    }

    pub fn average_rtt_ms(&self) -> Option<u64> {
        self.inner.health.lock().average_rtt_ms()
    }

    fn status(&self, text: &str) {
        self.inner.callback.on_status(text);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a room and start hosting it
    pub async fn host(&self) -> Result<RoomCode, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyInRoom);
        }

        self.status("Connecting to relay server...");
        let code = match self.inner.relay.host().await {
            Ok(resp) => resp.room_code,
            Err(e) => {
                warn!("Failed to host: {}", e);
                self.status(&connect_failure("Failed to host", &e));
                return Err(e.into());
            }
        };

        self.activate(code.clone(), true)?;
        self.status(&format!("Hosting session - Room code: {}", code));
        info!("Hosting room {}", code);
        Ok(code)
    }

    /// Join an existing room. Codes are matched case-insensitively.
    pub async fn join(&self, code: &str) -> Result<RoomCode, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyInRoom);
        }

        // Unparseable codes can't name a room
        let Some(code) = RoomCode::parse(code) else {
            self.status("Room not found.");
            return Err(SessionError::RoomNotFound(code.trim().to_string()));
        };

        self.status("Connecting to relay server...");
        match self.inner.relay.join(&code).await {
            Ok(_) => {}
            Err(RelayError::RoomNotFound(code)) => {
                self.status("Room not found.");
                return Err(SessionError::RoomNotFound(code.to_string()));
            }
            Err(e) => {
                warn!("Join failed: {}", e);
                self.status(&connect_failure("Join failed", &e));
                return Err(e.into());
            }
        }

        self.activate(code.clone(), false)?;
        self.status(&format!("Joined room: {}", code));
        info!("Joined room {}", code);
        Ok(code)
    }

    /// Stop polling and return to idle. The room stays on the relay until
    /// it expires.
    pub fn leave(&self) -> Result<(), SessionError> {
        let code = {
            let mut state = self.inner.state.write();
            let code = state.room_code().cloned().ok_or(SessionError::NotInRoom)?;
            *state = SessionState::Idle;
            code
        };
        self.stop_loops();
        self.inner.health.lock().reset();
        self.status("Left session");
        info!("Left room {}", code);
        Ok(())
    }

    fn activate(&self, code: RoomCode, as_host: bool) -> Result<(), SessionError> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.inner.state.write();
            if state.is_active() {
                return Err(SessionError::AlreadyInRoom);
            }
            let session = ActiveSession::new(code, generation);
            *state = if as_host {
                SessionState::Hosting(session)
            } else {
                SessionState::Joined(session)
            };
        }
        self.inner.health.lock().reset();
        self.start_poll_loop(generation);
        self.start_keep_alive_loop(generation);
        Ok(())
    }

    /// The room vanished from the relay (TTL eviction)
    fn expire(&self, generation: u64) {
        let code = {
            let mut state = self.inner.state.write();
            if !state.is_generation(generation) {
                return;
            }
            let code = state.room_code().cloned();
            *state = SessionState::Idle;
            code
        };
        self.stop_loops();
        self.inner.health.lock().reset();
        if let Some(code) = code {
            warn!("Room {} expired on the relay", code);
            self.status(&format!("Session expired - room {} no longer exists", code));
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Relay a command to the room.
    ///
    /// Returns `Ok(false)` without contacting the relay when a non-host tries
    /// to send a transport command.
    pub async fn send(&self, command: Command) -> Result<bool, SessionError> {
        let (code, generation, is_host) = {
            let state = self.inner.state.read();
            let active = state.active().ok_or(SessionError::NotInRoom)?;
            (active.room_code.clone(), active.generation(), state.is_host())
        };

        if command.requires_host() && !is_host {
            debug!("Not the host, '{}' stays local", command.tag());
            return Ok(false);
        }

        self.send_to(&code, generation, &command).await
    }

    /// Post to a room captured earlier, expiring that session generation if
    /// the relay no longer knows the room
    async fn send_to(
        &self,
        code: &RoomCode,
        generation: u64,
        command: &Command,
    ) -> Result<bool, SessionError> {
        match self.inner.relay.send(code, &command.to_wire()).await {
            Ok(()) => Ok(true),
            Err(e) if !e.is_recoverable() => {
                self.expire(generation);
                Err(e.into())
            }
            Err(e) => {
                warn!("Send of '{}' failed: {}", command.tag(), e);
                Err(e.into())
            }
        }
    }

    pub async fn play(&self, index: usize) -> Result<bool, SessionError> {
        self.send(Command::Play { index }).await
    }

    pub async fn pause(&self) -> Result<bool, SessionError> {
        self.send(Command::Pause).await
    }

    pub async fn unpause(&self) -> Result<bool, SessionError> {
        self.send(Command::Unpause).await
    }

    pub async fn stop(&self) -> Result<bool, SessionError> {
        self.send(Command::Stop).await
    }

    pub async fn next(&self, index: usize) -> Result<bool, SessionError> {
        self.send(Command::Next { index }).await
    }

    pub async fn prev(&self, index: usize) -> Result<bool, SessionError> {
        self.send(Command::Prev { index }).await
    }

    /// Skip to the next queue entry, wrapping at the end. `Ok(false)` when
    /// the queue is empty or we are not the host.
    pub async fn skip_forward(&self) -> Result<bool, SessionError> {
        let index = self.inner.player.lock().next_index();
        match index {
            Some(index) => self.next(index).await,
            None => Ok(false),
        }
    }

    /// Skip to the previous queue entry, wrapping at the start
    pub async fn skip_back(&self) -> Result<bool, SessionError> {
        let index = self.inner.player.lock().prev_index();
        match index {
            Some(index) => self.prev(index).await,
            None => Ok(false),
        }
    }

    /// Offer the local queue to everyone in the room
    pub async fn share_playlist(&self) -> Result<(), SessionError> {
        let (command, count) = {
            let player = self.inner.player.lock();
            if player.queue().is_empty() {
                return Err(SessionError::EmptyQueue);
            }
            let command = Command::SyncPlaylist {
                tracks: player.queue().to_vec(),
                current_index: player.current_index() as i64,
            };
            (command, player.queue().len())
        };

        self.send(command).await?;
        self.status(&format!("Playlist synced ({} songs)", count));
        Ok(())
    }

    /// Ask every participant for a library comparison
    pub async fn request_library(&self) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotInRoom);
        }
        if self.inner.player.lock().library().is_empty() {
            return Err(SessionError::EmptyLibrary);
        }

        self.send(Command::RequestLibrary).await?;
        self.status("Requesting library from other clients...");
        Ok(())
    }

    /// Ping with the long timeout to wake a sleeping relay
    pub async fn wake_relay(&self) -> Result<Duration, SessionError> {
        self.status("Waking up relay server...");
        match self.inner.relay.wake().await {
            Ok(rtt) => {
                info!("Relay awake after {}ms", rtt.as_millis());
                self.status("Relay server is awake");
                Ok(rtt)
            }
            Err(RelayError::Timeout) => {
                self.status("Server wake-up timeout");
                Err(SessionError::Relay(RelayError::Timeout))
            }
            Err(e) => {
                self.status(&format!("Server error: {}", e));
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Fetch and apply everything after the cursor. Returns how many
    /// commands the relay delivered.
    pub async fn poll_once(&self) -> Result<usize, SessionError> {
        let _guard = self.inner.poll_lock.lock().await;

        let (code, since, generation) = {
            let state = self.inner.state.read();
            let active = state.active().ok_or(SessionError::NotInRoom)?;
            (active.room_code.clone(), active.cursor(), active.generation())
        };

        let resp = match self.inner.relay.receive_since(&code, since).await {
            Ok(resp) => resp,
            Err(e) if !e.is_recoverable() => {
                self.expire(generation);
                return Err(e.into());
            }
            Err(e) => {
                let (errors, notice) = {
                    let mut health = self.inner.health.lock();
                    let notice = health.record_failure(&e);
                    (health.consecutive_errors(), notice)
                };
                warn!(
                    "Poll failed ({}/{}): {}",
                    errors, self.inner.config.max_consecutive_errors, e
                );
                if let Some(notice) = notice {
                    self.status(notice.message());
                }
                return Err(e.into());
            }
        };

        let notice = self.inner.health.lock().record_success();
        if let Some(notice) = notice {
            self.status(notice.message());
        }

        // Left (or rejoined) while the request was in flight
        if !self.inner.state.read().is_generation(generation) {
            return Ok(0);
        }

        let delivered = resp.commands.len();
        if delivered > 0 {
            debug!("Received {} command(s) from room {}", delivered, code);
        }

        let replies = self.apply_batch(resp.commands).await;

        if let Some(active) = self.inner.state.write().active_mut() {
            if active.generation() == generation {
                active.advance_cursor(resp.timestamp);
            }
        }

        // Replies belong to the room the commands came from
        if !self.inner.state.read().is_generation(generation) {
            debug!("Session changed while applying, dropping {} reply(s)", replies.len());
            return Ok(delivered);
        }
        for reply in replies {
            if let Err(e) = self.send_to(&code, generation, &reply).await {
                warn!("Failed to send library reply: {}", e);
            }
        }

        Ok(delivered)
    }

    /// Apply decoded commands in order on the blocking pool. Returns the
    /// replies to send.
    async fn apply_batch(&self, relayed: Vec<RelayedCommand>) -> Vec<Command> {
        let commands: Vec<Command> = relayed
            .into_iter()
            .filter_map(|relayed| {
                let tag = relayed.command.command.clone();
                match Command::try_from(relayed.command) {
                    Ok(command) => Some(command),
                    Err(e) => {
                        warn!("Dropping '{}': {}", tag, e);
                        None
                    }
                }
            })
            .collect();

        if commands.is_empty() {
            return Vec::new();
        }

        let player = Arc::clone(&self.inner.player);
        let callback = Arc::clone(&self.inner.callback);
        let applier = self.inner.applier.clone();

        let result = tokio::task::spawn_blocking(move || {
            commands
                .into_iter()
                .filter_map(|command| applier.apply_shared(command, &player, callback.as_ref()))
                .collect::<Vec<_>>()
        })
        .await;

        match result {
            Ok(replies) => replies,
            Err(e) => {
                warn!("Applying commands failed: {}", e);
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Background loops
    // =========================================================================

    fn start_poll_loop(&self, generation: u64) {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        if let Some(old) = self.inner.poll_cancel.lock().replace(cancel_tx) {
            let _ = old.send(());
        }

        let client = self.clone();
        let interval = self.inner.config.poll_interval;

        tokio::spawn(async move {
            info!("Poll loop started");

            loop {
                // Check for cancellation
                if cancel_rx.try_recv().is_ok() {
                    debug!("Poll loop cancelled");
                    break;
                }

                if !client.inner.state.read().is_generation(generation) {
                    debug!("Session ended, stopping poll loop");
                    break;
                }

                // Errors are logged and counted inside
                let _ = client.poll_once().await;

                tokio::time::sleep(interval).await;
            }

            info!("Poll loop ended");
        });
    }

    fn start_keep_alive_loop(&self, generation: u64) {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        if let Some(old) = self.inner.keep_alive_cancel.lock().replace(cancel_tx) {
            let _ = old.send(());
        }

        let client = self.clone();
        let interval = self.inner.config.keep_alive_interval;

        tokio::spawn(async move {
            debug!("Keep-alive loop started");

            loop {
                tokio::time::sleep(interval).await;

                if cancel_rx.try_recv().is_ok() {
                    debug!("Keep-alive loop cancelled");
                    break;
                }

                if !client.inner.state.read().is_generation(generation) {
                    break;
                }

                match client.inner.relay.ping().await {
                    Ok(rtt) => {
                        let mut health = client.inner.health.lock();
                        health.add_rtt_sample(rtt);
                        debug!(
                            "Keep-alive: RTT={}ms, avg={}ms",
                            rtt.as_millis(),
                            health.average_rtt_ms().unwrap_or_default()
                        );
                    }
                    Err(e) => warn!("Keep-alive ping failed: {}", e),
                }
            }

            debug!("Keep-alive loop ended");
        });
    }

    fn stop_loops(&self) {
        if let Some(tx) = self.inner.poll_cancel.lock().take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self.inner.keep_alive_cancel.lock().take() {
            let _ = tx.send(());
        }
    }
}

fn connect_failure(action: &str, error: &RelayError) -> String {
    match error {
        RelayError::Timeout => {
            "Connection timeout - relay server may be sleeping. Try again in 30 seconds."
                .to_string()
        }
        other => format!("{}: {}", action, other),
    }
}
