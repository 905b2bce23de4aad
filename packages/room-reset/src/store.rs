use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use llmlab_error::LabError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Session store location for `agent_id`. The per-agent `sessions/`
/// directory is preferred; older installs keep the file one level up.
pub fn session_store_path(agents_dir: &Path, agent_id: &str) -> PathBuf {
    let agent_dir = agents_dir.join(agent_id);
    let candidates = [
        agent_dir.join("sessions").join("sessions.json"),
        agent_dir.join("sessions.json"),
    ];
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .unwrap_or_else(|| candidates[0].clone())
}

/// One conversation's persisted state. Fields this crate does not know about
/// are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Milliseconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub system_sent: bool,
    #[serde(default)]
    pub aborted_last_run: bool,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl SessionStore {
    /// Reads the store. A missing or corrupt file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    tracing::warn!(path = %path.display(), "session store is not a json object");
                    Map::new()
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "session store is not valid json");
                    Map::new()
                }
            },
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "session store not readable");
                Map::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the first entry owned by `agent_id` whose key mentions
    /// `room_id`. Keys look like `agent:<agentId>:<channel>:<kind>:<roomId>`;
    /// the room id comparison ignores case.
    pub fn find_room_entry(&self, agent_id: &str, room_id: &str) -> Option<&str> {
        let prefix = format!("agent:{agent_id}:");
        let room_id = room_id.to_lowercase();
        self.entries
            .keys()
            .find(|key| key.starts_with(&prefix) && key.to_lowercase().contains(&room_id))
            .map(String::as_str)
    }

    pub fn entry(&self, key: &str) -> Option<SessionEntry> {
        self.entries
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Resets the entry at `key` in memory and returns its prior total token
    /// count. `None` when the key is absent.
    ///
    /// Works on the raw object so loosely typed entries (null flags, float
    /// timestamps) are still reset. Unknown fields are left in place.
    pub fn reset_entry(&mut self, key: &str, session_id: String, now_ms: i64) -> Option<u64> {
        let value = self.entries.get_mut(key)?;
        if !value.is_object() {
            tracing::warn!(key, "session entry is not a json object; replacing");
            *value = Value::Object(Map::new());
        }
        let map = value.as_object_mut()?;
        let prior = token_count(map.get("totalTokens"));

        map.insert("sessionId".to_string(), Value::String(session_id));
        map.insert("updatedAt".to_string(), Value::from(now_ms));
        map.insert("systemSent".to_string(), Value::Bool(false));
        map.insert("abortedLastRun".to_string(), Value::Bool(false));
        for counter in ["inputTokens", "outputTokens", "totalTokens"] {
            map.insert(counter.to_string(), Value::from(0_u64));
        }
        Some(prior)
    }

    /// Writes the whole store next to the original and renames it into place,
    /// so readers see either the old or the new file.
    pub fn save(&self) -> Result<(), LabError> {
        let persistence = |message: String| LabError::Persistence { message };
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .map_err(|err| persistence(format!("create {}: {err}", dir.display())))?;

        let mut contents = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| persistence(format!("encode session store: {err}")))?;
        contents.push('\n');

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|err| persistence(format!("create temp file in {}: {err}", dir.display())))?;
        temp.write_all(contents.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| persistence(format!("write temp session store: {err}")))?;
        if let Ok(metadata) = fs::metadata(&self.path) {
            let _ = temp.as_file().set_permissions(metadata.permissions());
        }
        temp.persist(&self.path)
            .map_err(|err| persistence(format!("replace {}: {}", self.path.display(), err.error)))?;
        Ok(())
    }
}

/// Token counter as stored; floats are rounded, anything else counts as zero.
fn token_count(value: Option<&Value>) -> u64 {
    value
        .and_then(|value| {
            value.as_u64().or_else(|| {
                value
                    .as_f64()
                    .filter(|tokens| tokens.is_finite() && *tokens >= 0.0)
                    .map(|tokens| tokens.round() as u64)
            })
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prefers_sessions_dir_then_legacy_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let primary = dir.path().join("main").join("sessions").join("sessions.json");
        let legacy = dir.path().join("main").join("sessions.json");

        assert_eq!(session_store_path(dir.path(), "main"), primary);

        fs::create_dir_all(legacy.parent().expect("parent")).expect("mkdir");
        fs::write(&legacy, "{}").expect("write legacy");
        assert_eq!(session_store_path(dir.path(), "main"), legacy);

        fs::create_dir_all(primary.parent().expect("parent")).expect("mkdir");
        fs::write(&primary, "{}").expect("write primary");
        assert_eq!(session_store_path(dir.path(), "main"), primary);
    }

    #[test]
    fn corrupt_store_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        fs::write(&path, "{\"truncated\": ").expect("write");
        assert!(SessionStore::load(&path).is_empty());
        assert!(SessionStore::load(dir.path().join("absent.json")).is_empty());
    }

    #[test]
    fn finds_entry_by_agent_prefix_and_room() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        fs::write(
            &path,
            json!({
                "agent:other:matrix:channel:!abc:example.org": {"totalTokens": 1},
                "agent:main:matrix:channel:!zzz:example.org": {"totalTokens": 2},
                "agent:main:matrix:channel:!abc:example.org": {"totalTokens": 3}
            })
            .to_string(),
        )
        .expect("write");

        let store = SessionStore::load(&path);
        assert_eq!(
            store.find_room_entry("main", "!ABC:example.org"),
            Some("agent:main:matrix:channel:!abc:example.org")
        );
        assert!(store.find_room_entry("main", "!nope:example.org").is_none());
        assert!(store.find_room_entry("mai", "!abc:example.org").is_none());
    }

    #[test]
    fn reset_preserves_unknown_fields_and_save_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        let key = "agent:main:matrix:channel:!abc:example.org";
        fs::write(
            &path,
            json!({
                key: {
                    "sessionId": "old",
                    "updatedAt": 1,
                    "systemSent": true,
                    "abortedLastRun": true,
                    "inputTokens": 40000,
                    "outputTokens": 5000,
                    "totalTokens": 45000,
                    "model": "nemo",
                    "origin": {"label": "LLMLab"}
                }
            })
            .to_string(),
        )
        .expect("write");

        let mut store = SessionStore::load(&path);
        let prior = store.reset_entry(key, "new-id".to_string(), 1_700_000_000_000);
        assert_eq!(prior, Some(45000));
        store.save().expect("save");

        let reloaded = SessionStore::load(&path);
        let entry = reloaded.entry(key).expect("entry");
        assert_eq!(entry.session_id.as_deref(), Some("new-id"));
        assert_eq!(entry.updated_at, Some(1_700_000_000_000));
        assert!(!entry.system_sent);
        assert!(!entry.aborted_last_run);
        assert_eq!((entry.input_tokens, entry.output_tokens, entry.total_tokens), (0, 0, 0));
        assert_eq!(entry.other["model"], "nemo");
        assert_eq!(entry.other["origin"]["label"], "LLMLab");
    }

    #[test]
    fn loosely_typed_entry_is_fully_reset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        let key = "agent:main:matrix:channel:!abc:example.org";
        fs::write(
            &path,
            json!({
                key: {
                    "sessionId": "old",
                    "updatedAt": 1700000000000.5,
                    "systemSent": null,
                    "abortedLastRun": true,
                    "inputTokens": 40000,
                    "outputTokens": 5000,
                    "totalTokens": 45000,
                    "label": "LLMLab"
                }
            })
            .to_string(),
        )
        .expect("write");

        let mut store = SessionStore::load(&path);
        assert_eq!(store.reset_entry(key, "new-id".to_string(), 42), Some(45000));
        store.save().expect("save");

        let saved: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        let entry = &saved[key];
        assert_eq!(entry["sessionId"], "new-id");
        assert_eq!(entry["updatedAt"], 42);
        assert_eq!(entry["systemSent"], false);
        assert_eq!(entry["abortedLastRun"], false);
        assert_eq!(entry["inputTokens"], 0);
        assert_eq!(entry["outputTokens"], 0);
        assert_eq!(entry["totalTokens"], 0);
        assert_eq!(entry["label"], "LLMLab");
    }

    #[test]
    fn float_token_totals_are_rounded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        fs::write(&path, json!({"agent:main:x": {"totalTokens": 1499.6}}).to_string())
            .expect("write");
        let mut store = SessionStore::load(&path);
        assert_eq!(store.reset_entry("agent:main:x", "id".to_string(), 0), Some(1500));
        assert_eq!(store.entry("agent:main:x").expect("entry").total_tokens, 0);
    }

    #[test]
    fn reset_of_missing_key_changes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = SessionStore::load(dir.path().join("sessions.json"));
        assert!(store.reset_entry("agent:main:x", "id".to_string(), 0).is_none());
        assert!(store.is_empty());
    }
}
