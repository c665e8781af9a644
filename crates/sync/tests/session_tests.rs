//! Integration tests for the session layer: serialized event
//! application, room bookkeeping, the notification panel policy, and
//! failure surfacing -- all driven through [`Session::apply_event`]
//! without a live backend.

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};

use homeroom_core::message::{MessageBody, MessageStatus, TOMBSTONE_TEXT};
use homeroom_core::notification::{NavigationTarget, Notification};
use homeroom_core::protocol::ServerEvent;
use homeroom_core::types::{MessageId, NotificationId, RoomId, Timestamp};
use homeroom_sync::config::SyncConfig;
use homeroom_sync::connection::{ConnectError, ConnectionSignal, ConnectionState, Credential};
use homeroom_sync::session::{Session, SessionError};

const OWN_USER_ID: i64 = 10;

fn session() -> Session {
    Session::new(
        SyncConfig::default(),
        Credential {
            user_id: OWN_USER_ID,
            display_name: "Me".to_string(),
            avatar_url: None,
            token: "tok".to_string(),
        },
    )
}

fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn created(id: MessageId, room_id: RoomId, at: i64) -> ServerEvent {
    ServerEvent::MessageCreated {
        id,
        room_id,
        author_id: 3,
        body: MessageBody::Text(format!("m{id}")),
        event_id: None,
        created_at: ts(at),
    }
}

fn notif(id: NotificationId, room_id: Option<RoomId>) -> Notification {
    Notification {
        id,
        kind: "room.invite".to_string(),
        title: format!("n{id}"),
        body: "body".to_string(),
        read: false,
        created_at: ts(id),
        room_id,
        target_screen: None,
    }
}

// ---------------------------------------------------------------------------
// Timeline event application
// ---------------------------------------------------------------------------

/// Created, edited, and deleted events apply in delivery order and the
/// tombstone is terminal.
#[tokio::test]
async fn created_edited_deleted_flow() {
    let session = session();

    session.apply_event(created(1, 7, 10)).await;
    session.apply_event(created(2, 7, 20)).await;
    session
        .apply_event(ServerEvent::MessageEdited {
            id: 2,
            room_id: 7,
            body: MessageBody::Text("hello2".to_string()),
        })
        .await;
    session
        .apply_event(ServerEvent::MessageDeleted { id: 1, room_id: 7 })
        .await;
    // A late edit for the deleted message must be dropped.
    session
        .apply_event(ServerEvent::MessageEdited {
            id: 1,
            room_id: 7,
            body: MessageBody::Text("resurrected".to_string()),
        })
        .await;

    let messages = session.timeline_messages(7).await.unwrap();
    assert_eq!(messages.len(), 2);

    assert_eq!(messages[0].id, 1);
    assert_eq!(messages[0].status, MessageStatus::Deleted);
    assert_eq!(
        messages[0].body,
        MessageBody::Text(TOMBSTONE_TEXT.to_string())
    );

    assert_eq!(messages[1].id, 2);
    assert_eq!(messages[1].status, MessageStatus::Edited);
    assert_eq!(messages[1].body, MessageBody::Text("hello2".to_string()));
}

/// Duplicate delivery of the same message id leaves a single entry.
#[tokio::test]
async fn duplicate_created_keeps_one_entry() {
    let session = session();
    for _ in 0..3 {
        session.apply_event(created(1, 7, 10)).await;
    }
    assert_eq!(session.timeline_messages(7).await.unwrap().len(), 1);
}

/// A delete for a message never seen locally is ignored without
/// creating a tombstone entry.
#[tokio::test]
async fn delete_for_unseen_message_is_ignored() {
    let session = session();
    session.apply_event(created(1, 7, 10)).await;
    session
        .apply_event(ServerEvent::MessageDeleted { id: 5, room_id: 7 })
        .await;

    let messages = session.timeline_messages(7).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, 1);

    // Delete for a room with no timeline at all: dropped, no state made.
    session
        .apply_event(ServerEvent::MessageDeleted { id: 5, room_id: 99 })
        .await;
    assert!(session.timeline_messages(99).await.is_none());
}

/// Event-scoped messages land in the event timeline, never the
/// primary one, for any arrival order.
#[tokio::test]
async fn event_scoped_messages_stay_out_of_primary() {
    let session = session();
    session
        .apply_event(ServerEvent::MessageCreated {
            id: 2,
            room_id: 7,
            author_id: 3,
            body: MessageBody::Text("event talk".to_string()),
            event_id: Some(4),
            created_at: ts(20),
        })
        .await;
    session.apply_event(created(1, 7, 10)).await;

    let primary = session.timeline_messages(7).await.unwrap();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].id, 1);

    let event = session.event_timeline_messages(7, 4).await.unwrap();
    assert_eq!(event.len(), 1);
    assert_eq!(event[0].id, 2);
}

/// An unfetched room is "not loaded" even while live messages are
/// visible.
#[tokio::test]
async fn live_only_timeline_is_not_loaded() {
    let session = session();
    session.apply_event(created(1, 7, 10)).await;
    assert!(!session.is_timeline_loaded(7).await);
    assert_eq!(session.timeline_messages(7).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Typing presence
// ---------------------------------------------------------------------------

/// A refresh for the same (room, user) pair never produces a second
/// entry; an explicit stop removes it immediately.
#[tokio::test]
async fn typing_refresh_and_stop() {
    let session = session();
    let started = ServerEvent::TypingStarted {
        room_id: 7,
        user_name: "Alice".to_string(),
    };
    session.apply_event(started.clone()).await;
    session.apply_event(started).await;

    assert_eq!(session.typing_users(7).await, vec!["Alice".to_string()]);

    session
        .apply_event(ServerEvent::TypingStopped {
            room_id: 7,
            user_name: "Alice".to_string(),
        })
        .await;
    assert!(session.typing_users(7).await.is_empty());
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Pushes increment the unread counter; opening the panel zeroes it
/// regardless of how many unread entries existed, and keeps it at zero
/// for pushes that arrive while it is open.
#[tokio::test]
async fn notification_panel_policy() {
    let session = session();
    session
        .apply_event(ServerEvent::NotificationCreated(notif(1, None)))
        .await;
    session
        .apply_event(ServerEvent::NotificationCreated(notif(2, None)))
        .await;
    assert_eq!(session.unread_count().await, 2);

    session.open_notifications().await;
    assert_eq!(session.unread_count().await, 0);

    session
        .apply_event(ServerEvent::NotificationCreated(notif(3, None)))
        .await;
    assert_eq!(session.unread_count().await, 0);
    assert_eq!(session.notifications().await.len(), 3);
}

/// Clicking a room-scoped notification flips its local read flag and
/// routes to the room's chat view.
#[tokio::test]
async fn clicking_a_notification_routes_and_marks_read() {
    let session = session();
    session
        .apply_event(ServerEvent::NotificationCreated(notif(1, Some(7))))
        .await;

    let target = session.click_notification(1).await;
    assert_eq!(target, Some(NavigationTarget::RoomChat(7)));

    let entries = session.notifications().await;
    assert!(entries[0].read);

    // Clicking an unknown id neither panics nor navigates.
    assert_eq!(session.click_notification(99).await, None);
}

// ---------------------------------------------------------------------------
// Presence roster
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_handlers_are_idempotent() {
    let session = session();
    let online = ServerEvent::PresenceOnline {
        user_name: "Bob".to_string(),
    };
    session.apply_event(online.clone()).await;
    session.apply_event(online).await;
    assert_eq!(session.online_users().await, vec!["Bob".to_string()]);

    let offline = ServerEvent::PresenceOffline {
        user_name: "Bob".to_string(),
    };
    session.apply_event(offline.clone()).await;
    session.apply_event(offline).await;
    assert!(session.online_users().await.is_empty());
}

// ---------------------------------------------------------------------------
// Room registry
// ---------------------------------------------------------------------------

/// Joins are idempotent and the rejoin set is exactly the joined rooms.
#[tokio::test]
async fn join_and_leave_bookkeeping() {
    let session = session();
    session.join_room(1).await;
    session.join_room(2).await;
    session.join_room(2).await;

    let mut rooms = session.joined_rooms().await;
    rooms.sort();
    assert_eq!(rooms, vec![1, 2]);

    session.leave_room(2).await;
    assert_eq!(session.joined_rooms().await, vec![1]);
}

/// Being kicked removes the room locally without a leave command.
#[tokio::test]
async fn kick_for_own_user_leaves_the_room() {
    let session = session();
    session.join_room(7).await;
    session.apply_event(created(1, 7, 10)).await;

    session
        .apply_event(ServerEvent::MemberKicked {
            room_id: 7,
            user_id: OWN_USER_ID,
        })
        .await;

    assert!(session.joined_rooms().await.is_empty());
    assert!(session.timeline_messages(7).await.is_none());
}

/// A kick for somebody else leaves our membership alone.
#[tokio::test]
async fn kick_for_other_user_keeps_the_room() {
    let session = session();
    session.join_room(7).await;
    session
        .apply_event(ServerEvent::MemberKicked {
            room_id: 7,
            user_id: 99,
        })
        .await;
    assert_eq!(session.joined_rooms().await, vec![7]);
}

// ---------------------------------------------------------------------------
// Failure surfacing
// ---------------------------------------------------------------------------

/// A send without a connection fails and hands the original content
/// back for retry.
#[tokio::test]
async fn failed_send_preserves_the_body() {
    let session = session();
    let body = MessageBody::Text("do not lose me".to_string());

    let failure = session.send_message(7, body.clone(), None).await.unwrap_err();
    assert_eq!(failure.body, body);
    assert_matches!(failure.reason, SessionError::NotConnected);
}

/// Empty text is rejected before anything goes on the wire.
#[tokio::test]
async fn empty_text_send_is_rejected() {
    let session = session();
    let failure = session
        .send_message(7, MessageBody::Text("   ".to_string()), None)
        .await
        .unwrap_err();
    assert_matches!(failure.reason, SessionError::Core(_));
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Disconnecting emits a terminal signal and settles the state.
#[tokio::test]
async fn disconnect_emits_terminal_signal() {
    let session = session();
    let mut signals = session.subscribe();

    session.disconnect().await;

    assert_eq!(session.connection_state().await, ConnectionState::Disconnected);
    let signal = signals.recv().await.unwrap();
    assert_matches!(signal, ConnectionSignal::Disconnected { .. });
}

/// A transport-level connect failure is distinguishable from an auth
/// rejection and leaves the session disconnected.
#[tokio::test]
async fn initial_connect_transport_failure() {
    let session = Session::new(
        SyncConfig {
            ws_url: "ws://127.0.0.1:1/ws".to_string(),
            ..SyncConfig::default()
        },
        Credential {
            user_id: OWN_USER_ID,
            display_name: "Me".to_string(),
            avatar_url: None,
            token: "tok".to_string(),
        },
    );

    let result = session.connect().await;
    assert_matches!(result, Err(ConnectError::Transport(_)));
    assert_eq!(session.connection_state().await, ConnectionState::Disconnected);
}
