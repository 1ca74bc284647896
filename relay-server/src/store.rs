//! Room Store
//!
//! In-memory table of rooms, each holding an append-only command log.
//! Commands are stamped with a receipt time from one strictly increasing
//! clock; readers pass the last stamp they saw to get only newer commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jamroom_core::network::{RelayedCommand, RoomCode, Timestamp, WireCommand};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Room not found")]
    RoomNotFound,
}

struct Room {
    created_at: Instant,
    log: Vec<RelayedCommand>,
}

impl Room {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

pub struct RoomStore {
    rooms: RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>>,
    /// Last stamp handed out
    clock: Mutex<Timestamp>,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            clock: Mutex::new(Timestamp::ZERO),
        }
    }

    /// Wall-clock time, bumped past the previous stamp when needed
    fn stamp(&self) -> Timestamp {
        let mut last = self.clock.lock();
        let stamp = Timestamp::now().max(last.next());
        *last = stamp;
        stamp
    }

    fn room(&self, code: &RoomCode) -> Result<Arc<Mutex<Room>>, StoreError> {
        self.rooms
            .read()
            .get(code)
            .cloned()
            .ok_or(StoreError::RoomNotFound)
    }

    /// Open a room under a fresh code
    pub fn create(&self) -> RoomCode {
        let mut rooms = self.rooms.write();
        let code = loop {
            let candidate = RoomCode::random();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        rooms.insert(
            code.clone(),
            Arc::new(Mutex::new(Room {
                created_at: Instant::now(),
                log: Vec::new(),
            })),
        );
        code
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.read().contains_key(code)
    }

    /// Append a command. Returns its receipt time.
    pub fn append(&self, code: &RoomCode, command: WireCommand) -> Result<Timestamp, StoreError> {
        let room = self.room(code)?;
        let mut room = room.lock();
        // Stamped under the room lock so it orders after any concurrent drain
        let timestamp = self.stamp();
        room.log.push(RelayedCommand { command, timestamp });
        Ok(timestamp)
    }

    /// Commands received after `since`, in append order, plus the current
    /// server time. Nothing is removed.
    pub fn drain_since(
        &self,
        code: &RoomCode,
        since: Timestamp,
    ) -> Result<(Vec<RelayedCommand>, Timestamp), StoreError> {
        let room = self.room(code)?;
        let room = room.lock();
        let start = room.log.partition_point(|c| c.timestamp <= since);
        let commands = room.log[start..].to_vec();
        Ok((commands, self.stamp()))
    }

    /// Remove rooms older than `ttl`. Rooms busy with a request are skipped
    /// until the next sweep. Returns the removed codes.
    ///
    /// Runs before every request, so the map is only write-locked when
    /// something has actually expired.
    pub fn evict_expired(&self, ttl: Duration) -> Vec<RoomCode> {
        let expired: Vec<RoomCode> = self
            .rooms
            .read()
            .iter()
            .filter(|(_, room)| room.try_lock().map(|r| r.is_expired(ttl)).unwrap_or(false))
            .map(|(code, _)| code.clone())
            .collect();
        if expired.is_empty() {
            return expired;
        }

        // Age only grows, so a room seen expired stays expired
        let mut rooms = self.rooms.write();
        expired
            .into_iter()
            .filter(|code| rooms.remove(code).is_some())
            .collect()
    }

    /// Codes of all open rooms, sorted
    pub fn room_codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self.rooms.read().keys().cloned().collect();
        codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        codes
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    /// Number of commands ever appended to a room
    pub fn log_len(&self, code: &RoomCode) -> Option<usize> {
        self.room(code).ok().map(|room| room.lock().log.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(tag: &str) -> WireCommand {
        WireCommand::new(tag)
    }

    fn tags(commands: &[RelayedCommand]) -> Vec<String> {
        commands.iter().map(|c| c.command.command.clone()).collect()
    }

    #[test]
    fn test_unknown_room() {
        let store = RoomStore::new();
        let code = RoomCode::parse("ABC123").unwrap();
        assert_eq!(store.append(&code, cmd("play")), Err(StoreError::RoomNotFound));
        assert_eq!(
            store.drain_since(&code, Timestamp::ZERO).unwrap_err(),
            StoreError::RoomNotFound
        );
        assert_eq!(store.log_len(&code), None);
    }

    #[test]
    fn test_drain_since_filters_in_order() {
        let store = RoomStore::new();
        let code = store.create();

        let t1 = store.append(&code, cmd("play")).unwrap();
        let t2 = store.append(&code, cmd("pause")).unwrap();
        let t3 = store.append(&code, cmd("unpause")).unwrap();
        assert!(t1 < t2 && t2 < t3);

        let (all, now) = store.drain_since(&code, Timestamp::ZERO).unwrap();
        assert_eq!(tags(&all), vec!["play", "pause", "unpause"]);
        assert!(now > t3);

        let (after_first, _) = store.drain_since(&code, t1).unwrap();
        assert_eq!(tags(&after_first), vec!["pause", "unpause"]);
        assert_eq!(after_first[0].timestamp, t2);
    }

    #[test]
    fn test_drain_is_idempotent() {
        let store = RoomStore::new();
        let code = store.create();
        store.append(&code, cmd("stop")).unwrap();

        let (first, _) = store.drain_since(&code, Timestamp::ZERO).unwrap();
        let (second, _) = store.drain_since(&code, Timestamp::ZERO).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.log_len(&code), Some(1));
    }

    #[test]
    fn test_cursor_from_empty_drain_never_misses_later_commands() {
        let store = RoomStore::new();
        let code = store.create();

        let (empty, cursor) = store.drain_since(&code, Timestamp::ZERO).unwrap();
        assert!(empty.is_empty());

        store.append(&code, cmd("next").with_index(1)).unwrap();
        let (fresh, cursor) = store.drain_since(&code, cursor).unwrap();
        assert_eq!(tags(&fresh), vec!["next"]);

        let (again, _) = store.drain_since(&code, cursor).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let store = Arc::new(RoomStore::new());
        let code = store.create();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let code = code.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.append(&code, cmd("pause")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (all, _) = store.drain_since(&code, Timestamp::ZERO).unwrap();
        assert_eq!(all.len(), 400);
        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_eviction() {
        let store = RoomStore::new();
        let old = store.create();
        std::thread::sleep(Duration::from_millis(20));
        let fresh = store.create();

        let evicted = store.evict_expired(Duration::from_millis(10));
        assert_eq!(evicted, vec![old.clone()]);
        assert!(!store.contains(&old));
        assert!(store.contains(&fresh));
        assert_eq!(store.len(), 1);

        assert!(store.evict_expired(Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn test_sweep_without_expiry_needs_no_write_lock() {
        let store = Arc::new(RoomStore::new());
        let code = store.create();

        let _reader = store.rooms.read();
        let (tx, rx) = std::sync::mpsc::channel();
        let sweeper = Arc::clone(&store);
        std::thread::spawn(move || {
            tx.send(sweeper.evict_expired(Duration::from_secs(3600))).unwrap();
        });

        let evicted = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(evicted.is_empty());
        assert!(store.rooms.read().contains_key(&code));
    }

    #[test]
    fn test_create_unique_codes() {
        let store = RoomStore::new();
        for _ in 0..200 {
            store.create();
        }
        assert_eq!(store.len(), 200);
        assert_eq!(store.room_codes().len(), 200);
    }
}
