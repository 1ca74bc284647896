//! Sync Engine
//!
//! Session state, the relayed command protocol, and the rules for applying
//! commands to local playback.

mod applier;
mod callback;
mod compare;
mod player;
mod protocol;
mod state;

pub use applier::*;
pub use callback::*;
pub use compare::*;
pub use player::*;
pub use protocol::*;
pub use state::*;
