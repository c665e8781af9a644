//! Room timeline: a duplicate-free, chronologically ordered view of a
//! room's messages, merged from a REST history page and the live push
//! stream.
//!
//! Live events are matched by message id. Created events append (after
//! dedup), edited events replace content, deleted events tombstone the
//! entry in place. Edits and deletes referencing ids this timeline has
//! never seen are dropped rather than triggering a backfill; a gap in
//! pages that were never fetched stays a lost update.
//!
//! Messages carrying a sub-event id never enter the room's primary
//! timeline; [`RoomTimelines`] routes them to the event's own timeline by
//! id equality only.

use std::collections::HashMap;

use crate::message::{Message, MessageBody};
use crate::types::{EventId, MessageId, RoomId};

/// Result of applying one live event to a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new message was appended to the tail.
    Appended,
    /// An existing message's body was replaced.
    Edited,
    /// An existing message was tombstoned.
    Deleted,
    /// Duplicate delivery of an already-known message id.
    IgnoredDuplicate,
    /// Edit or delete referencing an id this timeline has never seen.
    IgnoredUnknown,
    /// Edit after delete, or repeated delete: the tombstone is terminal.
    IgnoredStale,
}

/// Scroll the view only when a message was appended and the viewer was
/// already at the bottom. Deterministic for a fixed `at_bottom` flag.
pub fn should_scroll_to_bottom(outcome: ApplyOutcome, at_bottom: bool) -> bool {
    outcome == ApplyOutcome::Appended && at_bottom
}

/// One ordered, deduplicated message sequence.
///
/// Starts in a "not loaded" state so that a failed history fetch is
/// distinguishable from a room with no messages.
#[derive(Debug)]
pub struct RoomTimeline {
    room_id: RoomId,
    loaded: bool,
    messages: Vec<Message>,
    /// Message id -> index into `messages`. Entries are never removed,
    /// so indices stay valid.
    index: HashMap<MessageId, usize>,
}

impl RoomTimeline {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            loaded: false,
            messages: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Whether a history page has been merged in. `false` means
    /// "not loaded", never "empty room".
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The ordered message sequence, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.index.get(&id).map(|&i| &self.messages[i])
    }

    /// Merge a fetched history page into the timeline.
    ///
    /// Messages already present (delivered live before the fetch
    /// completed) win over their page counterparts, since the page is the
    /// older snapshot. The merged sequence is re-sorted by creation time
    /// (id as tiebreaker) and the timeline is marked loaded.
    ///
    /// Only called on a successful fetch: a failed fetch must leave the
    /// timeline untouched and not loaded.
    pub fn load_history(&mut self, page: Vec<Message>) {
        let mut merged = std::mem::take(&mut self.messages);
        self.index.clear();

        let known: std::collections::HashSet<MessageId> = merged.iter().map(|m| m.id).collect();
        merged.extend(page.into_iter().filter(|m| !known.contains(&m.id)));
        merged.sort_by_key(|m| (m.created_at, m.id));
        merged.dedup_by_key(|m| m.id);

        for (i, msg) in merged.iter().enumerate() {
            self.index.insert(msg.id, i);
        }
        self.messages = merged;
        self.loaded = true;
    }

    /// Apply a live "created" event. Duplicate ids are ignored.
    pub fn apply_created(&mut self, message: Message) -> ApplyOutcome {
        if self.index.contains_key(&message.id) {
            return ApplyOutcome::IgnoredDuplicate;
        }
        self.index.insert(message.id, self.messages.len());
        self.messages.push(message);
        ApplyOutcome::Appended
    }

    /// Apply a live "edited" event.
    pub fn apply_edited(&mut self, id: MessageId, body: MessageBody) -> ApplyOutcome {
        let Some(&i) = self.index.get(&id) else {
            return ApplyOutcome::IgnoredUnknown;
        };
        if self.messages[i].apply_edit(body) {
            ApplyOutcome::Edited
        } else {
            ApplyOutcome::IgnoredStale
        }
    }

    /// Apply a live "deleted" event. Never fabricates a tombstone for an
    /// unknown id.
    pub fn apply_deleted(&mut self, id: MessageId) -> ApplyOutcome {
        let Some(&i) = self.index.get(&id) else {
            return ApplyOutcome::IgnoredUnknown;
        };
        if self.messages[i].apply_delete() {
            ApplyOutcome::Deleted
        } else {
            ApplyOutcome::IgnoredStale
        }
    }
}

/// All timelines for one room: the primary view plus one side timeline
/// per sub-event.
#[derive(Debug)]
pub struct RoomTimelines {
    room_id: RoomId,
    primary: RoomTimeline,
    events: HashMap<EventId, RoomTimeline>,
}

impl RoomTimelines {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            primary: RoomTimeline::new(room_id),
            events: HashMap::new(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// The room's main timeline (event-scoped messages excluded).
    pub fn primary(&self) -> &RoomTimeline {
        &self.primary
    }

    pub fn event_timeline(&self, event_id: EventId) -> Option<&RoomTimeline> {
        self.events.get(&event_id)
    }

    /// Merge a fetched history page, partitioning entries between the
    /// primary timeline and their event timelines by event id.
    pub fn load_history(&mut self, page: Vec<Message>) {
        let mut primary_page = Vec::new();
        let mut event_pages: HashMap<EventId, Vec<Message>> = HashMap::new();
        for msg in page {
            match msg.event_id {
                Some(event_id) => event_pages.entry(event_id).or_default().push(msg),
                None => primary_page.push(msg),
            }
        }

        self.primary.load_history(primary_page);
        for (event_id, msgs) in event_pages {
            self.events
                .entry(event_id)
                .or_insert_with(|| RoomTimeline::new(self.room_id))
                .load_history(msgs);
        }
    }

    /// Route a created message to the primary or event timeline.
    pub fn apply_created(&mut self, message: Message) -> ApplyOutcome {
        match message.event_id {
            Some(event_id) => self
                .events
                .entry(event_id)
                .or_insert_with(|| RoomTimeline::new(self.room_id))
                .apply_created(message),
            None => self.primary.apply_created(message),
        }
    }

    /// Apply an edit wherever the message lives. Edited events carry no
    /// event id, so the primary timeline is tried first, then each event
    /// timeline until one recognizes the id.
    pub fn apply_edited(&mut self, id: MessageId, body: MessageBody) -> ApplyOutcome {
        let outcome = self.primary.apply_edited(id, body.clone());
        if outcome != ApplyOutcome::IgnoredUnknown {
            return outcome;
        }
        for timeline in self.events.values_mut() {
            let outcome = timeline.apply_edited(id, body.clone());
            if outcome != ApplyOutcome::IgnoredUnknown {
                return outcome;
            }
        }
        ApplyOutcome::IgnoredUnknown
    }

    /// Apply a delete wherever the message lives.
    pub fn apply_deleted(&mut self, id: MessageId) -> ApplyOutcome {
        let outcome = self.primary.apply_deleted(id);
        if outcome != ApplyOutcome::IgnoredUnknown {
            return outcome;
        }
        for timeline in self.events.values_mut() {
            let outcome = timeline.apply_deleted(id);
            if outcome != ApplyOutcome::IgnoredUnknown {
                return outcome;
            }
        }
        ApplyOutcome::IgnoredUnknown
    }
}
