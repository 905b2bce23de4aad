use std::path::Path;

use llmlab_error::{LabError, PERMISSION_DENIED_MESSAGE};
use llmlab_registry::{ResolvedRoom, RoomDirectory};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::access::{AccessPolicy, Caller, Operation};
use crate::store::{session_store_path, SessionStore};

/// Terminal state of one reset request.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResetOutcome {
    /// No room given, or the name did not resolve.
    ListRooms {
        requested: Option<String>,
        rooms: Vec<String>,
    },
    /// The rooms registry could not be read.
    RoomsUnavailable,
    Rejected { room: String },
    /// No session exists for the room yet.
    AlreadyFresh { room: String },
    Reset { room: String, cleared_tokens: u64 },
    Failed {
        room: String,
        #[serde(serialize_with = "serialize_error")]
        error: LabError,
    },
}

fn serialize_error<S: serde::Serializer>(error: &LabError, serializer: S) -> Result<S::Ok, S::Error> {
    error.to_report().serialize(serializer)
}

impl ResetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ResetOutcome::AlreadyFresh { .. } | ResetOutcome::Reset { .. })
    }

    pub fn message(&self) -> String {
        match self {
            ResetOutcome::ListRooms { requested, rooms } => {
                let list = render_room_list(rooms);
                match requested {
                    Some(name) => format!("Unknown room '{name}'.\n{list}"),
                    None => list,
                }
            }
            ResetOutcome::RoomsUnavailable => "Could not load room configuration.".to_string(),
            ResetOutcome::Rejected { .. } => PERMISSION_DENIED_MESSAGE.to_string(),
            ResetOutcome::AlreadyFresh { room } => {
                format!("{room} has no session yet; nothing to reset (0k tokens cleared).")
            }
            ResetOutcome::Reset {
                room,
                cleared_tokens,
            } => format!(
                "{room} session reset ({} tokens cleared).",
                format_thousands(*cleared_tokens)
            ),
            ResetOutcome::Failed { room, error } => {
                format!("Failed to reset {room}: {}", error.user_message())
            }
        }
    }
}

/// Token count rounded to the nearest thousand, e.g. `45k`.
pub fn format_thousands(tokens: u64) -> String {
    format!("{}k", (tokens as f64 / 1000.0).round() as u64)
}

pub fn render_room_list(rooms: &[String]) -> String {
    if rooms.is_empty() {
        return "No rooms can be reset from here.".to_string();
    }
    let mut out = String::from("Usage: reset <room>\nRooms:");
    for room in rooms {
        out.push_str("\n  - ");
        out.push_str(room);
    }
    out
}

/// Resets the session of an already resolved and authorized room.
pub fn reset_room(agents_dir: &Path, room: &ResolvedRoom) -> ResetOutcome {
    let name = room.config.room_name.clone();
    let store_path = session_store_path(agents_dir, &room.config.agent_id);
    let mut store = SessionStore::load(&store_path);

    let Some(key) = store
        .find_room_entry(&room.config.agent_id, &room.room_id)
        .map(str::to_string)
    else {
        tracing::info!(room = %name, agent = %room.config.agent_id, "no session to reset");
        return ResetOutcome::AlreadyFresh { room: name };
    };

    let now = OffsetDateTime::now_utc();
    let now_ms = (now.unix_timestamp_nanos() / 1_000_000) as i64;
    let Some(prior) = store.reset_entry(&key, Uuid::new_v4().to_string(), now_ms) else {
        return ResetOutcome::Failed {
            room: name,
            error: LabError::Persistence {
                message: format!("could not rewrite session entry {key}"),
            },
        };
    };

    if let Err(error) = store.save() {
        tracing::warn!(room = %name, error = %error, "failed to persist session reset");
        return ResetOutcome::Failed { room: name, error };
    }

    tracing::info!(
        room = %name,
        agent = %room.config.agent_id,
        cleared_tokens = prior,
        "session reset"
    );
    ResetOutcome::Reset {
        room: name,
        cleared_tokens: prior,
    }
}

/// Full reset flow: resolve the room, apply the gate, then reset.
pub fn handle_reset_request(
    rooms: &RoomDirectory,
    policy: &AccessPolicy,
    caller: &Caller,
    agents_dir: &Path,
    requested: Option<&str>,
) -> ResetOutcome {
    if !rooms.is_available() {
        return ResetOutcome::RoomsUnavailable;
    }

    let requested = requested.map(str::trim).filter(|name| !name.is_empty());
    let resolved = requested.and_then(|name| rooms.resolve(name));
    let Some(room) = resolved else {
        return ResetOutcome::ListRooms {
            requested: requested.map(str::to_string),
            rooms: policy
                .visible_rooms(caller, rooms)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
    };

    let operation = Operation::ResetRoom {
        public_reset: room.config.public_reset,
    };
    if !policy.allows(caller, operation) {
        tracing::info!(caller = ?caller.id, room = %room.config.room_name, "reset denied");
        return ResetOutcome::Rejected {
            room: room.config.room_name,
        };
    }

    reset_room(agents_dir, &room)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use llmlab_registry::RoomConfig;
    use serde_json::json;

    use super::*;

    const KEY: &str = "agent:main:matrix:channel:!lab:example.org";

    fn rooms() -> RoomDirectory {
        RoomDirectory::from_rooms([
            (
                "!lab:example.org".to_string(),
                RoomConfig {
                    agent_id: "main".to_string(),
                    room_name: "llmlab".to_string(),
                    public_reset: true,
                },
            ),
            (
                "!ops:example.org".to_string(),
                RoomConfig {
                    agent_id: "main".to_string(),
                    room_name: "ops".to_string(),
                    public_reset: false,
                },
            ),
        ])
    }

    fn write_store(agents_dir: &Path, value: serde_json::Value) -> std::path::PathBuf {
        let path = agents_dir.join("main").join("sessions").join("sessions.json");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, value.to_string()).expect("write store");
        path
    }

    #[test]
    fn public_room_reset_reports_cleared_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(
            dir.path(),
            json!({KEY: {"sessionId": "before", "totalTokens": 45000, "inputTokens": 44000, "outputTokens": 1000}}),
        );
        let policy = AccessPolicy::new(["@admin:x"]);
        let guest = policy.classify(Some("@visitor:x"));

        let outcome = handle_reset_request(&rooms(), &policy, &guest, dir.path(), Some("LLMLab"));
        assert!(outcome.is_success());
        assert!(outcome.message().contains("45k tokens"), "{}", outcome.message());

        let entry = SessionStore::load(&path).entry(KEY).expect("entry");
        assert_eq!(entry.total_tokens, 0);
        assert_ne!(entry.session_id.as_deref(), Some("before"));
        assert!(entry.session_id.is_some());
    }

    #[test]
    fn entry_with_null_flags_reports_real_token_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(
            dir.path(),
            json!({KEY: {"sessionId": "before", "systemSent": null, "totalTokens": 45000}}),
        );
        let policy = AccessPolicy::default();

        let outcome =
            handle_reset_request(&rooms(), &policy, &policy.classify(None), dir.path(), Some("llmlab"));
        assert!(outcome.message().contains("45k tokens"), "{}", outcome.message());

        let entry = SessionStore::load(&path).entry(KEY).expect("entry");
        assert_eq!(entry.total_tokens, 0);
        assert!(!entry.system_sent);
        assert_ne!(entry.session_id.as_deref(), Some("before"));
    }

    #[test]
    fn second_reset_clears_zero_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_store(dir.path(), json!({KEY: {"totalTokens": 1200}}));
        let policy = AccessPolicy::default();
        let operator = policy.classify(None);

        let first = handle_reset_request(&rooms(), &policy, &operator, dir.path(), Some("llmlab"));
        assert!(first.message().contains("1k tokens cleared"));
        let second = handle_reset_request(&rooms(), &policy, &operator, dir.path(), Some("llmlab"));
        assert!(second.is_success());
        assert!(second.message().contains("0k tokens cleared"));
    }

    #[test]
    fn missing_entry_is_already_fresh_and_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(dir.path(), json!({"agent:main:matrix:channel:!other:x": {"totalTokens": 9}}));
        let before = fs::read_to_string(&path).expect("read");
        let policy = AccessPolicy::default();

        let outcome =
            handle_reset_request(&rooms(), &policy, &policy.classify(None), dir.path(), Some("llmlab"));
        assert!(matches!(outcome, ResetOutcome::AlreadyFresh { .. }));
        assert!(outcome.is_success());
        assert!(outcome.message().contains("0k tokens cleared"));
        assert_eq!(fs::read_to_string(&path).expect("read"), before);

        let empty = tempfile::tempdir().expect("tempdir");
        let outcome =
            handle_reset_request(&rooms(), &policy, &policy.classify(None), empty.path(), Some("llmlab"));
        assert!(matches!(outcome, ResetOutcome::AlreadyFresh { .. }));
        assert!(!empty.path().join("main").exists());
    }

    #[test]
    fn guest_on_private_room_is_rejected_without_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(
            dir.path(),
            json!({"agent:main:matrix:channel:!ops:example.org": {"totalTokens": 5000}}),
        );
        let before = fs::read_to_string(&path).expect("read");
        let policy = AccessPolicy::new(["@admin:x"]);
        let guest = policy.classify(Some("@visitor:x"));

        let outcome = handle_reset_request(&rooms(), &policy, &guest, dir.path(), Some("ops"));
        assert!(matches!(outcome, ResetOutcome::Rejected { .. }));
        assert_eq!(outcome.message(), PERMISSION_DENIED_MESSAGE);
        assert_eq!(fs::read_to_string(&path).expect("read"), before);

        let admin = policy.classify(Some("@admin:x"));
        let outcome = handle_reset_request(&rooms(), &policy, &admin, dir.path(), Some("ops"));
        assert!(matches!(outcome, ResetOutcome::Reset { cleared_tokens: 5000, .. }));
    }

    #[test]
    fn unknown_or_missing_room_lists_visible_rooms() {
        let dir = tempfile::tempdir().expect("tempdir");
        let policy = AccessPolicy::new(["@admin:x"]);
        let guest = policy.classify(Some("@visitor:x"));

        let outcome = handle_reset_request(&rooms(), &policy, &guest, dir.path(), Some("kitchen"));
        insta::assert_snapshot!(outcome.message(), @r"
        Unknown room 'kitchen'.
        Usage: reset <room>
        Rooms:
          - llmlab
        ");

        let outcome = handle_reset_request(&rooms(), &policy, &policy.classify(None), dir.path(), None);
        match outcome {
            ResetOutcome::ListRooms { requested, rooms } => {
                assert!(requested.is_none());
                assert_eq!(rooms, vec!["llmlab", "ops"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unreadable_rooms_registry_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rooms = RoomDirectory::open(dir.path().join("rooms.json"));
        let policy = AccessPolicy::default();
        let outcome =
            handle_reset_request(&rooms, &policy, &policy.classify(None), dir.path(), Some("llmlab"));
        assert!(matches!(outcome, ResetOutcome::RoomsUnavailable));
        assert_eq!(outcome.message(), "Could not load room configuration.");
    }

    #[test]
    fn thousands_round_to_nearest() {
        assert_eq!(format_thousands(0), "0k");
        assert_eq!(format_thousands(499), "0k");
        assert_eq!(format_thousands(1500), "2k");
        assert_eq!(format_thousands(45_000), "45k");
    }

    #[cfg(unix)]
    #[test]
    fn write_failure_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(dir.path(), json!({KEY: {"totalTokens": 10}}));
        let sessions_dir = path.parent().expect("parent").to_path_buf();
        fs::set_permissions(&sessions_dir, fs::Permissions::from_mode(0o555)).expect("chmod");
        if tempfile::NamedTempFile::new_in(&sessions_dir).is_ok() {
            // Running as root; permissions are not enforced.
            fs::set_permissions(&sessions_dir, fs::Permissions::from_mode(0o755)).expect("chmod");
            return;
        }

        let policy = AccessPolicy::default();
        let outcome =
            handle_reset_request(&rooms(), &policy, &policy.classify(None), dir.path(), Some("llmlab"));
        fs::set_permissions(&sessions_dir, fs::Permissions::from_mode(0o755)).expect("chmod");

        assert!(!outcome.is_success());
        assert_eq!(
            outcome.message(),
            "Failed to reset llmlab: could not save the session store"
        );
        let entry = SessionStore::load(&path).entry(KEY).expect("entry");
        assert_eq!(entry.total_tokens, 10);
    }
}
