//! Jamroom - Core Library
//!
//! Listen-together sessions over an HTTP command relay: one participant hosts
//! a room, others join by code, and transport commands plus playlist and
//! library snapshots are relayed to everyone in the room.

pub mod config;
pub mod ffi;
pub mod health;
pub mod library;
pub mod network;
pub mod session;
pub mod sync;

// Re-exports for convenience
pub use config::SessionConfig;
pub use network::{RelayClient, RelayError, RoomCode, Timestamp, WireCommand};
pub use session::{SessionClient, SessionError};
pub use sync::{Command, CommandApplier, PlayerCallback, PlayerState, SharedPlayer, TrackRef};

// Setup uniffi scaffolding
uniffi::setup_scaffolding!();
