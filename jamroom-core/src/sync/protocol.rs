//! Sync Protocol Messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::network::WireCommand;

/// Locator of an audio item (absolute path or URI)
///
/// Equality is exact string equality. Cross-client comparisons use
/// [`TrackRef::basename`] because peers rarely share a filesystem layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(locator: impl Into<String>) -> Self {
        TrackRef(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component, splitting on both `/` and `\`
    pub fn basename(&self) -> &str {
        basename(&self.0)
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackRef {
    fn from(s: &str) -> Self {
        TrackRef(s.to_string())
    }
}

impl From<String> for TrackRef {
    fn from(s: String) -> Self {
        TrackRef(s)
    }
}

/// Final component of a path or URI
pub fn basename(locator: &str) -> &str {
    locator
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(locator)
}

/// Payload of `sync_playlist`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistData {
    pub playlist: Vec<TrackRef>,
    #[serde(default)]
    pub current_index: i64,
}

/// Payload of `library_comparison`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryData {
    pub library_count: usize,
    pub library_filenames: Vec<String>,
    #[serde(default)]
    pub is_reply: bool,
}

/// Commands relayed between participants of a room
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // === Transport (host only) ===
    /// Play the queue entry at `index`
    Play { index: usize },
    Pause,
    Unpause,
    Stop,
    /// Skip forward; `index` is the host's new position
    Next { index: usize },
    /// Skip back; `index` is the host's new position
    Prev { index: usize },

    // === Bulk operations (any participant) ===
    /// Offer a whole queue to every participant
    SyncPlaylist {
        tracks: Vec<TrackRef>,
        current_index: i64,
    },

    /// Ask every participant to answer with a library comparison
    RequestLibrary,

    /// A participant's library snapshot (basenames only)
    LibraryComparison {
        count: usize,
        filenames: BTreeSet<String>,
        is_reply: bool,
    },
}

/// Reasons a relayed envelope cannot become a [`Command`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{0}' requires an index")]
    MissingIndex(&'static str),

    #[error("'{command}' has invalid index {index}")]
    InvalidIndex { command: &'static str, index: i64 },

    #[error("'{0}' requires a data payload")]
    MissingData(&'static str),

    #[error("'{command}' has a malformed payload: {source}")]
    InvalidData {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Command {
    /// Wire tag for this command
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Pause => "pause",
            Command::Unpause => "unpause",
            Command::Stop => "stop",
            Command::Next { .. } => "next",
            Command::Prev { .. } => "prev",
            Command::SyncPlaylist { .. } => "sync_playlist",
            Command::RequestLibrary => "request_library",
            Command::LibraryComparison { .. } => "library_comparison",
        }
    }

    /// Check if this is a transport command that only the host may emit
    pub fn requires_host(&self) -> bool {
        matches!(
            self,
            Command::Play { .. }
                | Command::Pause
                | Command::Unpause
                | Command::Stop
                | Command::Next { .. }
                | Command::Prev { .. }
        )
    }

    /// Encode into the relay envelope
    pub fn to_wire(&self) -> WireCommand {
        let wire = WireCommand::new(self.tag());
        match self {
            Command::Play { index } | Command::Next { index } | Command::Prev { index } => {
                wire.with_index(*index as i64)
            }
            Command::Pause | Command::Unpause | Command::Stop | Command::RequestLibrary => wire,
            Command::SyncPlaylist {
                tracks,
                current_index,
            } => wire.with_data(serde_json::json!({
                "playlist": tracks,
                "current_index": current_index,
            })),
            Command::LibraryComparison {
                count,
                filenames,
                is_reply,
            } => wire.with_data(serde_json::json!({
                "library_count": count,
                "library_filenames": filenames,
                "is_reply": is_reply,
            })),
        }
    }
}

impl TryFrom<WireCommand> for Command {
    type Error = DecodeError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let tag = wire.command.trim().to_ascii_lowercase();
        match tag.as_str() {
            "play" => Ok(Command::Play {
                index: index_of("play", wire.index)?,
            }),
            "pause" => Ok(Command::Pause),
            "unpause" => Ok(Command::Unpause),
            "stop" => Ok(Command::Stop),
            "next" => Ok(Command::Next {
                index: index_of("next", wire.index)?,
            }),
            "prev" => Ok(Command::Prev {
                index: index_of("prev", wire.index)?,
            }),
            "sync_playlist" => {
                let data: PlaylistData = payload_of("sync_playlist", wire.data)?;
                Ok(Command::SyncPlaylist {
                    tracks: data.playlist,
                    current_index: data.current_index,
                })
            }
            "request_library" => Ok(Command::RequestLibrary),
            "library_comparison" => {
                let data: LibraryData = payload_of("library_comparison", wire.data)?;
                Ok(Command::LibraryComparison {
                    count: data.library_count,
                    filenames: data.library_filenames.into_iter().collect(),
                    is_reply: data.is_reply,
                })
            }
            _ => Err(DecodeError::UnknownCommand(wire.command)),
        }
    }
}

fn index_of(command: &'static str, index: Option<i64>) -> Result<usize, DecodeError> {
    let index = index.ok_or(DecodeError::MissingIndex(command))?;
    usize::try_from(index).map_err(|_| DecodeError::InvalidIndex { command, index })
}

fn payload_of<T: serde::de::DeserializeOwned>(
    command: &'static str,
    data: Option<serde_json::Value>,
) -> Result<T, DecodeError> {
    match data {
        None | Some(serde_json::Value::Null) => Err(DecodeError::MissingData(command)),
        Some(value) => {
            serde_json::from_value(value).map_err(|source| DecodeError::InvalidData { command, source })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: serde_json::Value) -> Result<Command, DecodeError> {
        let wire: WireCommand = serde_json::from_value(json).unwrap();
        Command::try_from(wire)
    }

    #[test]
    fn test_basename_handles_both_separators() {
        assert_eq!(basename("/home/me/music/song.mp3"), "song.mp3");
        assert_eq!(basename("C:\\Users\\me\\song.mp3"), "song.mp3");
        assert_eq!(basename("song.mp3"), "song.mp3");
        assert_eq!(TrackRef::from("file:///srv/a/b.flac").basename(), "b.flac");
    }

    #[test]
    fn test_decode_transport() {
        assert_eq!(
            decode(serde_json::json!({ "command": "play", "index": 2 })).unwrap(),
            Command::Play { index: 2 }
        );
        assert_eq!(
            decode(serde_json::json!({ "command": " PAUSE " })).unwrap(),
            Command::Pause
        );
        // Older hosts attach their index to stop/pause; it is ignored
        assert_eq!(
            decode(serde_json::json!({ "command": "stop", "index": 4 })).unwrap(),
            Command::Stop
        );
    }

    #[test]
    fn test_decode_rejects_bad_indices() {
        assert!(matches!(
            decode(serde_json::json!({ "command": "next" })),
            Err(DecodeError::MissingIndex("next"))
        ));
        assert!(matches!(
            decode(serde_json::json!({ "command": "prev", "index": -1 })),
            Err(DecodeError::InvalidIndex { index: -1, .. })
        ));
    }

    #[test]
    fn test_decode_bulk_payloads() {
        let cmd = decode(serde_json::json!({
            "command": "sync_playlist",
            "data": { "playlist": ["/a/x.mp3", "/a/y.mp3"] }
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::SyncPlaylist {
                tracks: vec!["/a/x.mp3".into(), "/a/y.mp3".into()],
                current_index: 0,
            }
        );

        let cmd = decode(serde_json::json!({
            "command": "library_comparison",
            "data": { "library_count": 3, "library_filenames": ["b", "a", "a"] }
        }))
        .unwrap();
        match cmd {
            Command::LibraryComparison {
                count,
                filenames,
                is_reply,
            } => {
                assert_eq!(count, 3);
                assert_eq!(filenames.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
                assert!(!is_reply);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_missing_or_malformed_data() {
        assert!(matches!(
            decode(serde_json::json!({ "command": "sync_playlist" })),
            Err(DecodeError::MissingData("sync_playlist"))
        ));
        assert!(matches!(
            decode(serde_json::json!({ "command": "library_comparison", "data": { "x": 1 } })),
            Err(DecodeError::InvalidData { .. })
        ));
        assert!(matches!(
            decode(serde_json::json!({ "command": "shuffle" })),
            Err(DecodeError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_wire_encoding_decodes_back() {
        let commands = vec![
            Command::Prev { index: 0 },
            Command::RequestLibrary,
            Command::SyncPlaylist {
                tracks: vec!["/m/a.ogg".into()],
                current_index: 7,
            },
            Command::LibraryComparison {
                count: 2,
                filenames: ["a.mp3".to_string(), "b.mp3".to_string()].into_iter().collect(),
                is_reply: true,
            },
        ];
        for cmd in commands {
            assert_eq!(Command::try_from(cmd.to_wire()).unwrap(), cmd);
        }
    }

    #[test]
    fn test_requires_host() {
        assert!(Command::Play { index: 0 }.requires_host());
        assert!(Command::Stop.requires_host());
        assert!(!Command::RequestLibrary.requires_host());
        assert!(!Command::SyncPlaylist {
            tracks: vec![],
            current_index: 0
        }
        .requires_host());
    }
}
