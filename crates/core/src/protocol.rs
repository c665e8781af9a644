//! Wire protocol for the realtime push channel.
//!
//! Inbound [`ServerEvent`]s and outbound [`ClientCommand`]s are JSON
//! messages with an internally-tagged `"type"` discriminator so that
//! both ends can route messages by type string. Every variant is a
//! closed struct -- no runtime field-presence checks anywhere.

use serde::{Deserialize, Serialize};

use crate::message::MessageBody;
use crate::notification::Notification;
use crate::types::{EventId, MessageId, RoomId, Timestamp, UserId};

/// Events pushed by the server.
///
/// Room-scoped unless noted. A malformed frame fails to parse as a
/// whole; callers drop that single frame and keep processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A new message was posted to a room.
    #[serde(rename = "message.created")]
    MessageCreated {
        id: MessageId,
        room_id: RoomId,
        author_id: UserId,
        body: MessageBody,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<EventId>,
        created_at: Timestamp,
    },

    /// An existing message's content was replaced.
    #[serde(rename = "message.edited")]
    MessageEdited {
        id: MessageId,
        room_id: RoomId,
        body: MessageBody,
    },

    /// A message was deleted and should be tombstoned in place.
    #[serde(rename = "message.deleted")]
    MessageDeleted { id: MessageId, room_id: RoomId },

    /// A user started composing in a room.
    #[serde(rename = "typing.started")]
    TypingStarted { room_id: RoomId, user_name: String },

    /// A user stopped composing in a room.
    #[serde(rename = "typing.stopped")]
    TypingStopped { room_id: RoomId, user_name: String },

    /// A member was removed from a room.
    #[serde(rename = "member.kicked")]
    MemberKicked { room_id: RoomId, user_id: UserId },

    /// A session-scoped notification was created.
    #[serde(rename = "notification.created")]
    NotificationCreated(Notification),

    /// A user came online (global broadcast).
    #[serde(rename = "presence.online")]
    PresenceOnline { user_name: String },

    /// A user went offline (global broadcast).
    #[serde(rename = "presence.offline")]
    PresenceOffline { user_name: String },
}

/// Commands sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "room.join")]
    RoomJoin { room_id: RoomId },

    #[serde(rename = "room.leave")]
    RoomLeave { room_id: RoomId },

    #[serde(rename = "message.send")]
    MessageSend {
        room_id: RoomId,
        body: MessageBody,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<EventId>,
    },

    #[serde(rename = "message.edit")]
    MessageEdit { id: MessageId, body: MessageBody },

    #[serde(rename = "message.delete")]
    MessageDelete { id: MessageId },

    #[serde(rename = "typing.start")]
    TypingStart { room_id: RoomId },

    #[serde(rename = "typing.stop")]
    TypingStop { room_id: RoomId },
}

/// Parse a realtime text frame into a typed [`ServerEvent`].
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// log the failure and continue with the next frame.
pub fn parse_event(text: &str) -> Result<ServerEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Serialize a [`ClientCommand`] to its JSON wire form.
pub fn encode_command(command: &ClientCommand) -> Result<String, serde_json::Error> {
    serde_json::to_string(command)
}
