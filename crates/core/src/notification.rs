//! Session-wide notification feed and its read-state policy.
//!
//! The unread counter follows the panel policy of the product, which is
//! deliberate and must be preserved exactly: opening the panel zeroes
//! the displayed counter and triggers a bulk mark-all-read upstream;
//! clicking an individual unread item flips that item's local flag and
//! triggers a per-item mark-read, independent of the bulk call. Both
//! upstream calls are fire-and-forget -- the optimistic local state is
//! never rolled back on failure.

use serde::{Deserialize, Serialize};

use crate::types::{NotificationId, RoomId, Timestamp};

/// A single notification entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    /// Machine-readable type tag, e.g. `"room.invite"`.
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: Timestamp,
    /// Set when clicking the notification should open a room's chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Set when clicking should route to a generic screen instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_screen: Option<String>,
}

/// Where clicking a notification routes the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// Open the room's chat view.
    RoomChat(RoomId),
    /// Open a named screen.
    Screen(String),
}

impl Notification {
    /// Resolve the click destination. Room metadata and target screen
    /// are mutually exclusive; room metadata wins if both are present.
    pub fn navigation_target(&self) -> Option<NavigationTarget> {
        if let Some(room_id) = self.room_id {
            return Some(NavigationTarget::RoomChat(room_id));
        }
        self.target_screen
            .clone()
            .map(NavigationTarget::Screen)
    }
}

/// Ordered notification list with the unread-counter invariant.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    /// Newest first.
    entries: Vec<Notification>,
    unread: usize,
    panel_open: bool,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the feed with the fetched backlog. The unread counter
    /// becomes the count of entries with `read == false` (zero while
    /// the panel is open, per the panel policy).
    pub fn load_backlog(&mut self, mut entries: Vec<Notification>) {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.unread = if self.panel_open {
            0
        } else {
            entries.iter().filter(|n| !n.read).count()
        };
        self.entries = entries;
    }

    /// Prepend a pushed notification. Increments the unread counter
    /// unless the panel is open (an open panel subsumes the increment).
    pub fn push(&mut self, notification: Notification) {
        let unread = !notification.read;
        self.entries.insert(0, notification);
        if self.panel_open {
            self.unread = 0;
        } else if unread {
            self.unread += 1;
        }
    }

    /// Open the panel: the displayed counter drops to zero immediately.
    ///
    /// Returns `true` when the panel was previously closed, in which
    /// case the caller must issue the bulk mark-all-read request.
    pub fn open_panel(&mut self) -> bool {
        self.unread = 0;
        if self.panel_open {
            return false;
        }
        self.panel_open = true;
        true
    }

    /// Close the panel. The counter stays at zero; no refetch happens
    /// on a later reopen.
    pub fn close_panel(&mut self) {
        self.panel_open = false;
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Flip one entry's local read flag. Returns `true` when the entry
    /// existed and was unread, in which case the caller must issue the
    /// per-item mark-read request.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if entry.read {
            return false;
        }
        entry.read = true;
        if !self.panel_open {
            self.unread = self.unread.saturating_sub(1);
        }
        true
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries.iter().find(|n| n.id == id)
    }

    /// The full list, newest first.
    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    /// The displayed unread count.
    pub fn unread_count(&self) -> usize {
        self.unread
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn notif(id: NotificationId, read: bool) -> Notification {
        Notification {
            id,
            kind: "room.invite".to_string(),
            title: format!("n{id}"),
            body: "body".to_string(),
            read,
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            room_id: None,
            target_screen: None,
        }
    }

    #[test]
    fn backlog_sets_unread_to_unread_entry_count() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, true), notif(2, false), notif(3, false)]);
        assert_eq!(feed.unread_count(), 2);
        assert_eq!(feed.entries().len(), 3);
    }

    #[test]
    fn backlog_orders_newest_first() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, true), notif(3, false), notif(2, false)]);
        let ids: Vec<NotificationId> = feed.entries().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn push_prepends_and_increments() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, true)]);
        feed.push(notif(2, false));
        assert_eq!(feed.entries()[0].id, 2);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn push_while_panel_open_keeps_counter_at_zero() {
        let mut feed = NotificationFeed::new();
        feed.open_panel();
        feed.push(notif(1, false));
        feed.push(notif(2, false));
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(feed.entries().len(), 2);
    }

    #[test]
    fn opening_the_panel_always_zeroes_the_counter() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, false), notif(2, false), notif(3, false)]);
        assert_eq!(feed.unread_count(), 3);

        assert!(feed.open_panel());
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn reopening_does_not_reissue_the_bulk_call() {
        let mut feed = NotificationFeed::new();
        assert!(feed.open_panel());
        assert!(!feed.open_panel());

        feed.close_panel();
        assert!(feed.open_panel());
    }

    #[test]
    fn counter_stays_zero_after_close() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, false)]);
        feed.open_panel();
        feed.close_panel();
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn mark_read_flips_only_the_target_entry() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, false), notif(2, false)]);
        feed.open_panel();

        assert!(feed.mark_read(1));
        assert!(feed.get(1).unwrap().read);
        assert!(!feed.get(2).unwrap().read);
        // Already read / unknown ids do not warrant another request.
        assert!(!feed.mark_read(1));
        assert!(!feed.mark_read(99));
    }

    #[test]
    fn mark_read_with_panel_closed_decrements() {
        let mut feed = NotificationFeed::new();
        feed.load_backlog(vec![notif(1, false), notif(2, false)]);
        assert!(feed.mark_read(1));
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn room_metadata_routes_to_chat() {
        let mut n = notif(1, false);
        n.room_id = Some(42);
        assert_eq!(n.navigation_target(), Some(NavigationTarget::RoomChat(42)));
    }

    #[test]
    fn screen_metadata_routes_to_screen() {
        let mut n = notif(1, false);
        n.target_screen = Some("reports".to_string());
        assert_eq!(
            n.navigation_target(),
            Some(NavigationTarget::Screen("reports".to_string()))
        );
    }

    #[test]
    fn no_metadata_routes_nowhere() {
        assert_eq!(notif(1, false).navigation_target(), None);
    }
}
