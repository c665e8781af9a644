//! Typing presence: the per-room tracker for remote peers, plus the
//! debounced compose state for the local input box.
//!
//! Tracker entries are keyed by (room, display name) and carry a
//! freshness timestamp. A repeated "started" refreshes the entry, an
//! explicit "stopped" removes it immediately, and a periodic sweep
//! removes entries whose freshness exceeded the TTL -- the defense
//! against a peer that disconnected without sending "stopped". Because
//! a stop removes the entry outright, no expiry can fire for a pair
//! after its stop.

use std::collections::HashMap;

use chrono::Duration;

use crate::types::{RoomId, Timestamp};

/// Default freshness window, in seconds, before a typing entry expires
/// without a refresh.
pub const DEFAULT_TYPING_TTL_SECS: u64 = 6;

/// Tracks who is currently composing in each room.
#[derive(Debug)]
pub struct TypingTracker {
    ttl: Duration,
    /// (room, display name) -> last refresh time.
    entries: HashMap<(RoomId, String), Timestamp>,
}

impl TypingTracker {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            entries: HashMap::new(),
        }
    }

    /// Record a "started typing" event: inserts the pair or refreshes
    /// its timestamp. Never produces a second entry for the same pair.
    pub fn started(&mut self, room_id: RoomId, user_name: &str, now: Timestamp) {
        self.entries.insert((room_id, user_name.to_string()), now);
    }

    /// Record an explicit "stopped typing" event. Idempotent.
    pub fn stopped(&mut self, room_id: RoomId, user_name: &str) {
        self.entries.remove(&(room_id, user_name.to_string()));
    }

    /// Remove every entry whose freshness has exceeded the TTL.
    /// Returns the removed pairs so callers can log them.
    pub fn expire(&mut self, now: Timestamp) -> Vec<(RoomId, String)> {
        let ttl = self.ttl;
        let mut expired = Vec::new();
        self.entries.retain(|key, last| {
            if now.signed_duration_since(*last) > ttl {
                expired.push(key.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Display names currently typing in a room, unordered.
    pub fn typing_in(&self, room_id: RoomId) -> Vec<String> {
        self.entries
            .keys()
            .filter(|(room, _)| *room == room_id)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Drop every entry for one room (used when leaving it).
    pub fn clear_room(&mut self, room_id: RoomId) {
        self.entries.retain(|(room, _), _| *room != room_id);
    }

    /// Drop all entries (used on connection teardown).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Signal the local client should emit to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeSignal {
    Start,
    Stop,
}

/// Debounced composing state for one room's input box.
///
/// A signal is produced only on the empty/non-empty transitions, never
/// per keystroke.
#[derive(Debug, Default)]
pub struct ComposeState {
    composing: bool,
}

impl ComposeState {
    /// Feed the current input text. Returns `Start` on the first
    /// non-empty input of a burst, `Stop` when the input is cleared.
    pub fn input_changed(&mut self, text: &str) -> Option<ComposeSignal> {
        let non_empty = !text.is_empty();
        match (self.composing, non_empty) {
            (false, true) => {
                self.composing = true;
                Some(ComposeSignal::Start)
            }
            (true, false) => {
                self.composing = false;
                Some(ComposeSignal::Stop)
            }
            _ => None,
        }
    }

    /// The message was sent: the burst is over.
    pub fn message_sent(&mut self) -> Option<ComposeSignal> {
        if self.composing {
            self.composing = false;
            Some(ComposeSignal::Stop)
        } else {
            None
        }
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }
}
