use std::collections::BTreeSet;

use llmlab_error::LabError;
use llmlab_registry::RoomDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerTier {
    Authorized,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// `None` for the local operator at the terminal.
    pub id: Option<String>,
    pub tier: CallerTier,
}

impl Caller {
    pub fn is_authorized(&self) -> bool {
        self.tier == CallerTier::Authorized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Status,
    List,
    Benchmark,
    Switch,
    Stop,
    ResetRoom { public_reset: bool },
}

/// Two-tier policy: users on the allow-list may do anything, everyone else
/// may only reset rooms flagged `publicReset`.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    authorized: BTreeSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(authorized: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authorized: authorized.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, sender: Option<&str>) -> Caller {
        match sender {
            None => Caller {
                id: None,
                tier: CallerTier::Authorized,
            },
            Some(id) => Caller {
                id: Some(id.to_string()),
                tier: if self.authorized.contains(id) {
                    CallerTier::Authorized
                } else {
                    CallerTier::Guest
                },
            },
        }
    }

    pub fn allows(&self, caller: &Caller, operation: Operation) -> bool {
        match operation {
            Operation::ResetRoom { public_reset } => caller.is_authorized() || public_reset,
            Operation::Status
            | Operation::List
            | Operation::Benchmark
            | Operation::Switch
            | Operation::Stop => caller.is_authorized(),
        }
    }

    pub fn check(&self, caller: &Caller, operation: Operation) -> Result<(), LabError> {
        if self.allows(caller, operation) {
            return Ok(());
        }
        tracing::info!(caller = ?caller.id, operation = ?operation, "operation denied");
        Err(LabError::PermissionDenied { room: None })
    }

    /// Room names the caller may reset, in registry order.
    pub fn visible_rooms<'a>(&self, caller: &Caller, rooms: &'a RoomDirectory) -> Vec<&'a str> {
        rooms
            .rooms()
            .filter(|(_, config)| {
                self.allows(
                    caller,
                    Operation::ResetRoom {
                        public_reset: config.public_reset,
                    },
                )
            })
            .map(|(_, config)| config.room_name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use llmlab_registry::RoomConfig;

    use super::*;

    fn rooms() -> RoomDirectory {
        RoomDirectory::from_rooms([
            room("!a:x", "llmlab", true),
            room("!b:x", "ops", false),
            room("!c:x", "garden", true),
        ])
    }

    fn room(id: &str, name: &str, public_reset: bool) -> (String, RoomConfig) {
        (
            id.to_string(),
            RoomConfig {
                agent_id: "main".to_string(),
                room_name: name.to_string(),
                public_reset,
            },
        )
    }

    #[test]
    fn guests_only_reset_public_rooms() {
        let policy = AccessPolicy::new(["@admin:x"]);
        let guest = policy.classify(Some("@visitor:x"));
        let admin = policy.classify(Some("@admin:x"));

        assert_eq!(guest.tier, CallerTier::Guest);
        assert!(policy.allows(&guest, Operation::ResetRoom { public_reset: true }));
        assert!(!policy.allows(&guest, Operation::ResetRoom { public_reset: false }));
        assert!(policy.allows(&admin, Operation::ResetRoom { public_reset: false }));
    }

    #[test]
    fn everything_else_is_authorized_only() {
        let policy = AccessPolicy::new(["@admin:x"]);
        let guest = policy.classify(Some("@visitor:x"));
        let admin = policy.classify(Some("@admin:x"));
        for operation in [
            Operation::Status,
            Operation::List,
            Operation::Benchmark,
            Operation::Switch,
            Operation::Stop,
        ] {
            assert!(policy.allows(&admin, operation));
            let err = policy.check(&guest, operation).expect_err("guest denied");
            assert!(matches!(err, LabError::PermissionDenied { .. }));
        }
    }

    #[test]
    fn local_operator_is_authorized() {
        let policy = AccessPolicy::default();
        assert!(policy.classify(None).is_authorized());
        assert!(!policy.classify(Some("")).is_authorized());
    }

    #[test]
    fn guest_room_list_is_a_subset() {
        let policy = AccessPolicy::new(["@admin:x"]);
        let rooms = rooms();
        let guest = policy.visible_rooms(&policy.classify(Some("@visitor:x")), &rooms);
        let admin = policy.visible_rooms(&policy.classify(Some("@admin:x")), &rooms);

        assert_eq!(admin, vec!["llmlab", "ops", "garden"]);
        assert_eq!(guest, vec!["llmlab", "garden"]);
        assert!(guest.iter().all(|name| admin.contains(name)));
    }
}
