//! Room membership and role rules.
//!
//! Each joined room has exactly one leader; everyone else is a member.
//! Leader transfer demotes the old leader and promotes the new one in a
//! single operation so no observer ever sees zero or two leaders.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{RoomId, UserId};

/// Role of a user within a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomRole {
    Leader,
    Member,
}

/// One user's membership in a room, as returned by the member-list
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMember {
    pub user_id: UserId,
    pub display_name: String,
    pub role: RoomRole,
}

/// The member set of one room.
#[derive(Debug)]
pub struct MemberRoster {
    room_id: RoomId,
    members: Vec<RoomMember>,
}

impl MemberRoster {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            members: Vec::new(),
        }
    }

    /// Build a roster from a fetched member list, validating that it
    /// carries exactly one leader.
    pub fn from_members(room_id: RoomId, members: Vec<RoomMember>) -> Result<Self, CoreError> {
        let leaders = members
            .iter()
            .filter(|m| m.role == RoomRole::Leader)
            .count();
        if leaders > 1 {
            return Err(CoreError::Conflict(format!(
                "Room {room_id} member list carries {leaders} leaders"
            )));
        }
        Ok(Self { room_id, members })
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Insert or update a member entry.
    pub fn upsert(&mut self, member: RoomMember) {
        match self.members.iter_mut().find(|m| m.user_id == member.user_id) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    /// Remove a member (leave or kick). Idempotent.
    pub fn remove(&mut self, user_id: UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.user_id != user_id);
        self.members.len() != before
    }

    pub fn get(&self, user_id: UserId) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn leader(&self) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.role == RoomRole::Leader)
    }

    pub fn members(&self) -> &[RoomMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Transfer leadership from `from` to `to`: the old leader becomes
    /// a member in the same operation that promotes the new one.
    pub fn transfer_leadership(&mut self, from: UserId, to: UserId) -> Result<(), CoreError> {
        match self.get(from) {
            Some(m) if m.role == RoomRole::Leader => {}
            Some(_) => {
                return Err(CoreError::Forbidden(format!(
                    "User {from} is not the leader of room {}",
                    self.room_id
                )))
            }
            None => return Err(CoreError::NotFound { entity: "member", id: from }),
        }
        if self.get(to).is_none() {
            return Err(CoreError::NotFound { entity: "member", id: to });
        }

        for member in &mut self.members {
            if member.user_id == from {
                member.role = RoomRole::Member;
            } else if member.user_id == to {
                member.role = RoomRole::Leader;
            }
        }
        Ok(())
    }
}
