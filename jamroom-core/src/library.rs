//! Local Persistence
//!
//! JSON files the desktop and mobile front-ends keep between runs: the song
//! library, the current queue, named playlists and the volume setting.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sync::TrackRef;

const LIBRARY_FILE: &str = "library.json";
const PLAYLIST_FILE: &str = "current_playlist.json";
const VOLUME_FILE: &str = "volume_settings.json";
const PLAYLISTS_DIR: &str = "playlists";

pub const DEFAULT_VOLUME: f32 = 0.7;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid playlist name '{0}'")]
    InvalidName(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryFile {
    #[serde(default)]
    pub songs: Vec<TrackRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueFile {
    #[serde(default)]
    pub playlist: Vec<TrackRef>,
    #[serde(default)]
    pub current_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedPlaylist {
    pub name: String,
    #[serde(default)]
    pub songs: Vec<TrackRef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeFile {
    pub volume: f32,
}

impl Default for VolumeFile {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
        }
    }
}

/// Data directory holding the front-end's JSON files
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_library(&self) -> Vec<TrackRef> {
        self.load::<LibraryFile>(&self.root.join(LIBRARY_FILE)).songs
    }

    pub fn save_library(&self, songs: &[TrackRef]) -> Result<(), StorageError> {
        self.save(
            &self.root.join(LIBRARY_FILE),
            &LibraryFile {
                songs: songs.to_vec(),
            },
        )
    }

    /// The saved queue; a saved position past the end resets to 0
    pub fn load_queue(&self) -> QueueFile {
        let mut queue: QueueFile = self.load(&self.root.join(PLAYLIST_FILE));
        if queue.current_index >= queue.playlist.len() {
            queue.current_index = 0;
        }
        queue
    }

    pub fn save_queue(&self, playlist: &[TrackRef], current_index: usize) -> Result<(), StorageError> {
        self.save(
            &self.root.join(PLAYLIST_FILE),
            &QueueFile {
                playlist: playlist.to_vec(),
                current_index,
            },
        )
    }

    /// Volume in `0.0..=1.0`
    pub fn load_volume(&self) -> f32 {
        let volume = self.load::<VolumeFile>(&self.root.join(VOLUME_FILE)).volume;
        if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        }
    }

    pub fn save_volume(&self, volume: f32) -> Result<(), StorageError> {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        };
        self.save(&self.root.join(VOLUME_FILE), &VolumeFile { volume })
    }

    pub fn save_playlist(&self, name: &str, songs: &[TrackRef]) -> Result<(), StorageError> {
        let path = self.playlist_path(name)?;
        self.save(
            &path,
            &NamedPlaylist {
                name: name.trim().to_string(),
                songs: songs.to_vec(),
            },
        )
    }

    pub fn load_playlist(&self, name: &str) -> Result<Option<NamedPlaylist>, StorageError> {
        let path = self.playlist_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(read_json(&path))
    }

    /// Saved playlist names, sorted
    pub fn list_playlists(&self) -> Vec<String> {
        let dir = self.root.join(PLAYLISTS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|path| read_json::<NamedPlaylist>(&path))
            .map(|playlist| playlist.name)
            .collect();
        names.sort();
        names
    }

    /// Returns whether a playlist was removed
    pub fn delete_playlist(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.playlist_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn playlist_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let stem = file_stem(name).ok_or_else(|| StorageError::InvalidName(name.to_string()))?;
        Ok(self.root.join(PLAYLISTS_DIR).join(format!("{}.json", stem)))
    }

    /// Missing files load as defaults; corrupt ones are logged and replaced
    /// by defaults
    fn load<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        if !path.exists() {
            debug!("{} not found, using defaults", path.display());
            return T::default();
        }
        read_json(path).unwrap_or_default()
    }

    fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt {}: {}", path.display(), e);
            None
        }
    }
}

/// File-safe stem for a playlist name: alphanumerics, `-`, `_` and spaces kept
fn file_stem(name: &str) -> Option<String> {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches('_').is_empty() {
        None
    } else {
        Some(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalStore {
        let dir = std::env::temp_dir().join(format!("jamroom-test-{}", rand::random::<u64>()));
        LocalStore::new(dir)
    }

    fn tracks(names: &[&str]) -> Vec<TrackRef> {
        names.iter().map(|n| TrackRef::from(*n)).collect()
    }

    #[test]
    fn test_missing_files_load_defaults() {
        let store = temp_store();
        assert!(store.load_library().is_empty());
        assert!(store.load_queue().playlist.is_empty());
        assert_eq!(store.load_volume(), DEFAULT_VOLUME);
        assert!(store.list_playlists().is_empty());
    }

    #[test]
    fn test_library_and_queue_persist() {
        let store = temp_store();
        store.save_library(&tracks(&["/m/a.mp3", "/m/b.mp3"])).unwrap();
        store.save_queue(&tracks(&["/m/b.mp3"]), 0).unwrap();

        assert_eq!(store.load_library(), tracks(&["/m/a.mp3", "/m/b.mp3"]));
        let queue = store.load_queue();
        assert_eq!(queue.playlist, tracks(&["/m/b.mp3"]));
        assert_eq!(queue.current_index, 0);

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_corrupt_and_out_of_range_files() {
        let store = temp_store();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.root().join(LIBRARY_FILE), "{ not json").unwrap();
        fs::write(
            store.root().join(PLAYLIST_FILE),
            r#"{"playlist": ["a"], "current_index": 4}"#,
        )
        .unwrap();

        assert!(store.load_library().is_empty());
        assert_eq!(store.load_queue().current_index, 0);

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_volume_is_clamped() {
        let store = temp_store();
        store.save_volume(1.7).unwrap();
        assert_eq!(store.load_volume(), 1.0);

        fs::write(store.root().join(VOLUME_FILE), r#"{"volume": -3.0}"#).unwrap();
        assert_eq!(store.load_volume(), 0.0);

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_named_playlists() {
        let store = temp_store();
        store.save_playlist("Road Trip", &tracks(&["x"])).unwrap();
        store.save_playlist("chill/night", &tracks(&["y", "z"])).unwrap();

        assert_eq!(store.list_playlists(), vec!["Road Trip", "chill/night"]);
        let loaded = store.load_playlist("chill/night").unwrap().unwrap();
        assert_eq!(loaded.songs, tracks(&["y", "z"]));

        assert!(store.delete_playlist("Road Trip").unwrap());
        assert!(!store.delete_playlist("Road Trip").unwrap());
        assert!(store.load_playlist("Road Trip").unwrap().is_none());
        assert!(matches!(
            store.save_playlist("///", &[]),
            Err(StorageError::InvalidName(_))
        ));

        let _ = fs::remove_dir_all(store.root());
    }
}
