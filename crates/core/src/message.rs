//! Message model and the edit/delete state machine.
//!
//! A message is created in `sent` status, may transition to `edited` any
//! number of times, and terminally to `deleted`. Deletion replaces the
//! body with [`TOMBSTONE_TEXT`] and blocks all further edits; the entry
//! stays in its timeline for the life of the session's view.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EventId, MessageId, RoomId, Timestamp, UserId};

/// Body substituted in place of a deleted message.
pub const TOMBSTONE_TEXT: &str = "[message deleted]";

/// Reference to an uploaded attachment (image or document).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Download URL of the stored file.
    pub url: String,
    /// Original filename shown to the user.
    pub name: String,
}

/// Message content. Exactly one of text, image, or document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text.
    Text(String),
    /// An uploaded image.
    Image(AttachmentRef),
    /// An uploaded document.
    Document(AttachmentRef),
}

/// Mutation status of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Edited,
    Deleted,
}

/// A single entry in a room (or event) timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub author_id: UserId,
    pub body: MessageBody,
    /// Non-null only for messages scoped to a sub-event timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub created_at: Timestamp,
    pub status: MessageStatus,
}

impl Message {
    /// Construct a freshly created message in `sent` status.
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        author_id: UserId,
        body: MessageBody,
        event_id: Option<EventId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            author_id,
            body,
            event_id,
            created_at,
            status: MessageStatus::Sent,
        }
    }

    /// Whether this message belongs to a sub-event timeline.
    pub fn is_event_scoped(&self) -> bool {
        self.event_id.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.status == MessageStatus::Deleted
    }

    /// Replace the body and mark the message as edited.
    ///
    /// Returns `false` (and leaves the message untouched) when the
    /// message is already deleted -- the tombstone is terminal.
    pub fn apply_edit(&mut self, body: MessageBody) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.body = body;
        self.status = MessageStatus::Edited;
        true
    }

    /// Tombstone the message: body becomes [`TOMBSTONE_TEXT`], status
    /// becomes `deleted`.
    ///
    /// Returns `false` if the message was already deleted.
    pub fn apply_delete(&mut self) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.body = MessageBody::Text(TOMBSTONE_TEXT.to_string());
        self.status = MessageStatus::Deleted;
        true
    }
}

/// Validate a message body before sending.
///
/// Text must contain at least one non-whitespace character; attachments
/// must carry a non-empty URL.
pub fn validate_body(body: &MessageBody) -> Result<(), CoreError> {
    match body {
        MessageBody::Text(text) => {
            if text.trim().is_empty() {
                return Err(CoreError::Validation(
                    "Message text must not be empty".to_string(),
                ));
            }
        }
        MessageBody::Image(att) | MessageBody::Document(att) => {
            if att.url.trim().is_empty() {
                return Err(CoreError::Validation(
                    "Attachment URL must not be empty".to_string(),
                ));
            }
        }
    }
    Ok(())
}
