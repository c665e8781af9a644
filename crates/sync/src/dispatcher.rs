//! Serialized application of inbound server events to session state.
//!
//! One invocation runs per event, in transport delivery order for the
//! connection that produced it; every mutation happens under the
//! session's state lock. Per-event failures -- stale edits, deletes for
//! never-seen ids, events for unknown rooms -- are logged and dropped
//! without affecting later events.

use chrono::Utc;

use homeroom_core::message::Message;
use homeroom_core::protocol::ServerEvent;
use homeroom_core::timeline::{ApplyOutcome, RoomTimelines};

use crate::session::Session;

pub(crate) async fn apply(session: &Session, event: ServerEvent) {
    match event {
        ServerEvent::MessageCreated {
            id,
            room_id,
            author_id,
            body,
            event_id,
            created_at,
        } => {
            let message = Message::new(id, room_id, author_id, body, event_id, created_at);
            let mut state = session.state.write().await;
            let outcome = state
                .timelines
                .entry(room_id)
                .or_insert_with(|| RoomTimelines::new(room_id))
                .apply_created(message);
            if outcome == ApplyOutcome::IgnoredDuplicate {
                tracing::debug!(room_id, message_id = id, "Duplicate message.created dropped");
            }
        }

        ServerEvent::MessageEdited { id, room_id, body } => {
            let mut state = session.state.write().await;
            match state.timelines.get_mut(&room_id) {
                Some(timelines) => {
                    let outcome = timelines.apply_edited(id, body);
                    if matches!(
                        outcome,
                        ApplyOutcome::IgnoredUnknown | ApplyOutcome::IgnoredStale
                    ) {
                        tracing::debug!(room_id, message_id = id, ?outcome, "Stale edit dropped");
                    }
                }
                None => {
                    tracing::debug!(room_id, message_id = id, "Edit for unknown room dropped");
                }
            }
        }

        ServerEvent::MessageDeleted { id, room_id } => {
            let mut state = session.state.write().await;
            match state.timelines.get_mut(&room_id) {
                Some(timelines) => {
                    let outcome = timelines.apply_deleted(id);
                    if matches!(
                        outcome,
                        ApplyOutcome::IgnoredUnknown | ApplyOutcome::IgnoredStale
                    ) {
                        tracing::debug!(room_id, message_id = id, ?outcome, "Stale delete dropped");
                    }
                }
                None => {
                    tracing::debug!(room_id, message_id = id, "Delete for unknown room dropped");
                }
            }
        }

        ServerEvent::TypingStarted { room_id, user_name } => {
            session
                .state
                .write()
                .await
                .typing
                .started(room_id, &user_name, Utc::now());
        }

        ServerEvent::TypingStopped { room_id, user_name } => {
            session.state.write().await.typing.stopped(room_id, &user_name);
        }

        ServerEvent::MemberKicked { room_id, user_id } => {
            let mut state = session.state.write().await;
            if user_id == session.credential.user_id {
                // Kicked ourselves: leave locally. No room.leave command
                // goes out -- the server already removed us.
                tracing::info!(room_id, "Kicked from room, leaving locally");
                state.registry.leave(room_id);
                state.timelines.remove(&room_id);
                state.members.remove(&room_id);
                state.typing.clear_room(room_id);
                state.compose.remove(&room_id);
            } else if let Some(roster) = state.members.get_mut(&room_id) {
                roster.remove(user_id);
            }
        }

        ServerEvent::NotificationCreated(notification) => {
            session.state.write().await.notifications.push(notification);
        }

        ServerEvent::PresenceOnline { user_name } => {
            session.state.write().await.roster.user_online(user_name);
        }

        ServerEvent::PresenceOffline { user_name } => {
            session.state.write().await.roster.user_offline(&user_name);
        }
    }
}
