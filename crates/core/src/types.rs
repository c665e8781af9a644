//! Shared identifier and timestamp types.

use chrono::{DateTime, Utc};

/// Server-assigned database identifier.
pub type DbId = i64;

/// Identifier of a room.
pub type RoomId = DbId;

/// Identifier of a message.
pub type MessageId = DbId;

/// Identifier of a sub-event (messages tied to one are kept out of the
/// room's main timeline).
pub type EventId = DbId;

/// Identifier of a notification.
pub type NotificationId = DbId;

/// Identifier of a user.
pub type UserId = DbId;

/// UTC timestamp used across the domain.
pub type Timestamp = DateTime<Utc>;
