//! Relay Networking
//!
//! HTTP client and wire types for the command relay.

mod client;
mod room_code;
mod types;

pub use client::{RelayClient, RelayError};
pub use room_code::{RoomCode, CODE_LENGTH};
pub use types::*;
