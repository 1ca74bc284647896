//! Jamroom Relay
//!
//! HTTP command relay for listening sessions: rooms with append-only command
//! logs, read by cursor, evicted lazily after a fixed lifetime.

pub mod config;
pub mod dashboard;
pub mod metrics;
pub mod server;
pub mod service;
pub mod store;

pub use config::RelayConfig;
pub use service::{router, AppState, SharedMetrics};
pub use store::{RoomStore, StoreError};
