//! Global online-presence roster.

use std::collections::HashSet;

/// Process-wide set of online display names, updated only by the
/// `presence.online` / `presence.offline` broadcast handlers. Consumers
/// read; they never mutate.
#[derive(Debug, Default)]
pub struct PresenceRoster {
    online: HashSet<String>,
}

impl PresenceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to the online set. Idempotent; returns `true` when
    /// the user was newly added.
    pub fn user_online(&mut self, user_name: impl Into<String>) -> bool {
        self.online.insert(user_name.into())
    }

    /// Remove a user from the online set. Idempotent; returns `true`
    /// when the user was present.
    pub fn user_offline(&mut self, user_name: &str) -> bool {
        self.online.remove(user_name)
    }

    pub fn is_online(&self, user_name: &str) -> bool {
        self.online.contains(user_name)
    }

    /// Snapshot of online display names, unordered.
    pub fn online_users(&self) -> Vec<String> {
        self.online.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}
