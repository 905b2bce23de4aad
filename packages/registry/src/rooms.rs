use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::{keyed_entries, read_json_file};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub agent_id: String,
    pub room_name: String,
    #[serde(default)]
    pub public_reset: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoom {
    pub room_id: String,
    pub config: RoomConfig,
}

#[derive(Debug)]
struct LoadedRooms {
    stamp: FileStamp,
    rooms: IndexMap<String, RoomConfig>,
    by_name: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Room registry plus its case-insensitive name index.
///
/// The directory is an explicit value owned by whoever runs a command. Call
/// [`RoomDirectory::reload_if_changed`] before serving a request from a
/// long-lived holder; the index is rebuilt when the file's modification time
/// or size moves.
#[derive(Debug)]
pub struct RoomDirectory {
    path: PathBuf,
    loaded: Option<LoadedRooms>,
}

impl RoomDirectory {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let loaded = load_rooms(&path);
        Self { path, loaded }
    }

    pub fn from_rooms<I>(rooms: I) -> Self
    where
        I: IntoIterator<Item = (String, RoomConfig)>,
    {
        Self {
            path: PathBuf::new(),
            loaded: Some(index_rooms(
                FileStamp {
                    modified: None,
                    len: 0,
                },
                rooms.into_iter().collect(),
            )),
        }
    }

    /// `false` when the rooms file was missing or unreadable at last load.
    pub fn is_available(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn reload(&mut self) {
        self.loaded = load_rooms(&self.path);
    }

    /// Reloads when the backing file changed since the last load. Returns
    /// whether a reload happened.
    pub fn reload_if_changed(&mut self) -> bool {
        if self.path.as_os_str().is_empty() {
            return false;
        }
        let current = FileStamp::of(&self.path);
        let previous = self.loaded.as_ref().map(|loaded| loaded.stamp);
        if current == previous {
            return false;
        }
        tracing::debug!(path = %self.path.display(), "rooms registry changed; reloading");
        self.reload();
        true
    }

    pub fn rooms(&self) -> impl Iterator<Item = (&str, &RoomConfig)> {
        self.loaded
            .iter()
            .flat_map(|loaded| loaded.rooms.iter())
            .map(|(id, config)| (id.as_str(), config))
    }

    /// Resolves a human room name (case-insensitive) or an exact room id.
    /// Names shared by several rooms resolve to nothing.
    pub fn resolve(&self, name: &str) -> Option<ResolvedRoom> {
        let loaded = self.loaded.as_ref()?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some(config) = loaded.rooms.get(name) {
            return Some(ResolvedRoom {
                room_id: name.to_string(),
                config: config.clone(),
            });
        }

        let ids = loaded.by_name.get(&name.to_lowercase())?;
        if ids.len() != 1 {
            tracing::warn!(room = %name, matches = ids.len(), "room name is ambiguous");
            return None;
        }
        let room_id = &ids[0];
        loaded.rooms.get(room_id).map(|config| ResolvedRoom {
            room_id: room_id.clone(),
            config: config.clone(),
        })
    }
}

fn load_rooms(path: &Path) -> Option<LoadedRooms> {
    let stamp = FileStamp::of(path)?;
    let value = read_json_file(path)?;
    let Value::Object(map) = value else {
        tracing::warn!(path = %path.display(), "rooms registry is not a json object");
        return None;
    };
    let rooms = keyed_entries::<RoomConfig>(map, "rooms").into_iter().collect();
    Some(index_rooms(stamp, rooms))
}

fn index_rooms(stamp: FileStamp, rooms: IndexMap<String, RoomConfig>) -> LoadedRooms {
    let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
    for (room_id, config) in &rooms {
        by_name
            .entry(config.room_name.to_lowercase())
            .or_default()
            .push(room_id.clone());
    }
    for (name, ids) in &by_name {
        if ids.len() > 1 {
            tracing::warn!(room = %name, ids = ?ids, "room name is not unique");
        }
    }
    LoadedRooms {
        stamp,
        rooms,
        by_name,
    }
}
