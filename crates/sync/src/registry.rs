//! Joined-room bookkeeping.
//!
//! The registry is the authoritative record of which rooms this session
//! has joined. After any reconnection the session re-issues `room.join`
//! for exactly the set held here -- the transport knows nothing about
//! membership. The registry also remembers which rooms already have a
//! populated timeline so the history fetch runs exactly once per join,
//! not once per reconnection of an already-fetched room.

use std::collections::HashSet;

use homeroom_core::types::RoomId;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    joined: HashSet<RoomId>,
    fetched: HashSet<RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a join. Returns `false` when the room was already joined
    /// (the join is then a no-op for the caller too).
    pub fn join(&mut self, room_id: RoomId) -> bool {
        self.joined.insert(room_id)
    }

    /// Record a leave (or kick). The room drops out of the rejoin set,
    /// and a later re-join starts from a fresh history fetch.
    pub fn leave(&mut self, room_id: RoomId) -> bool {
        self.fetched.remove(&room_id);
        self.joined.remove(&room_id)
    }

    pub fn is_joined(&self, room_id: RoomId) -> bool {
        self.joined.contains(&room_id)
    }

    /// Mark a room's timeline as populated by a successful fetch.
    pub fn mark_fetched(&mut self, room_id: RoomId) {
        self.fetched.insert(room_id);
    }

    pub fn is_fetched(&self, room_id: RoomId) -> bool {
        self.fetched.contains(&room_id)
    }

    /// The rejoin set, in unspecified order.
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.joined.iter().copied().collect()
    }

    /// Joined rooms whose history has not been fetched yet.
    pub fn rooms_needing_fetch(&self) -> Vec<RoomId> {
        self.joined
            .iter()
            .filter(|room| !self.fetched.contains(room))
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent() {
        let mut registry = RoomRegistry::new();
        assert!(registry.join(1));
        assert!(!registry.join(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejoin_set_is_exactly_the_joined_rooms() {
        let mut registry = RoomRegistry::new();
        registry.join(1);
        registry.join(2);
        registry.join(3);
        registry.leave(2);

        let mut rooms = registry.joined_rooms();
        rooms.sort();
        assert_eq!(rooms, vec![1, 3]);
    }

    #[test]
    fn fetch_runs_once_per_join() {
        let mut registry = RoomRegistry::new();
        registry.join(1);
        registry.join(2);
        registry.mark_fetched(1);

        // After a reconnect, only the never-fetched room needs a fetch.
        assert_eq!(registry.rooms_needing_fetch(), vec![2]);
    }

    #[test]
    fn leaving_resets_the_fetched_flag() {
        let mut registry = RoomRegistry::new();
        registry.join(1);
        registry.mark_fetched(1);
        registry.leave(1);

        registry.join(1);
        assert!(!registry.is_fetched(1));
        assert_eq!(registry.rooms_needing_fetch(), vec![1]);
    }

    #[test]
    fn leave_for_unjoined_room_is_a_no_op() {
        let mut registry = RoomRegistry::new();
        assert!(!registry.leave(9));
    }
}
