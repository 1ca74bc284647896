//! Wire types shared by the relay and its clients

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use super::RoomCode;

/// Server-assigned time, microseconds since the UNIX epoch
///
/// On the wire this is a JSON number of seconds (with a fractional part), the
/// same unit the relay reports from `/ping`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The beginning of time; polling since zero returns a room's full log
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        Timestamp(micros)
    }

    /// Convert from fractional seconds. Negative and non-finite values map to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Timestamp::ZERO;
        }
        Timestamp((secs * 1_000_000.0).round() as u64)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// The next representable instant
    pub fn next(&self) -> Self {
        Timestamp(self.0.saturating_add(1))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_secs_f64())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Timestamp::from_secs_f64)
    }
}

/// A command as it travels through the relay: `{command, index?, data?}`
///
/// The relay never interprets it; clients decode it into a
/// [`Command`](crate::sync::Command).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WireCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            index: None,
            data: None,
        }
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A command delivered by `/receive`, tagged with its receipt time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedCommand {
    #[serde(flatten)]
    pub command: WireCommand,
    pub timestamp: Timestamp,
}

/// Response for `POST /host`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResponse {
    pub room_code: RoomCode,
}

/// Response for `POST /join/{code}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub status: String,
    pub room_code: RoomCode,
}

/// Generic `{status}` acknowledgement (used by `POST /send/{code}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Response for `GET /receive/{code}?since=`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveResponse {
    #[serde(default)]
    pub commands: Vec<RelayedCommand>,
    /// Server time at the moment of the read; the caller's next cursor
    pub timestamp: Timestamp,
}

/// Query string for `GET /receive/{code}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveQuery {
    #[serde(default)]
    pub since: Timestamp,
}

/// Response for `GET /ping`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: Timestamp,
}

/// Response for `GET /rooms` (debugging aid)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomCode>,
    pub count: usize,
}

/// Error body returned alongside non-2xx statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
