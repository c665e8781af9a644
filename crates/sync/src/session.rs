//! The session: one authenticated identity, one realtime connection,
//! and all the per-session state the realtime core keeps consistent.
//!
//! [`Session`] is a cheaply cloneable handle; every clone shares the
//! same state. All mutable state -- joined-room registry, per-room
//! timelines, typing tracker, notification feed, presence roster --
//! lives behind a single lock and is written either by the serialized
//! event dispatcher or by the explicit methods below. Nothing is
//! ambient: consumers receive the session by value and read snapshots.
//!
//! A session is single-use. [`Session::disconnect`] (or a credential
//! change, which means building a new session) cancels the connection,
//! the typing-expiry sweep, and every in-flight collaborator call tied
//! to it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use homeroom_core::error::CoreError;
use homeroom_core::membership::{MemberRoster, RoomMember};
use homeroom_core::message::{validate_body, Message, MessageBody};
use homeroom_core::notification::{NavigationTarget, Notification, NotificationFeed};
use homeroom_core::presence::PresenceRoster;
use homeroom_core::protocol::{encode_command, parse_event, ClientCommand, ServerEvent};
use homeroom_core::timeline::RoomTimelines;
use homeroom_core::types::{EventId, MessageId, NotificationId, RoomId};
use homeroom_core::typing::{ComposeSignal, ComposeState, TypingTracker};

use crate::config::SyncConfig;
use crate::connection::{
    ConnectError, Connection, ConnectionSignal, ConnectionState, Connector, Credential,
};
use crate::dispatcher;
use crate::reconnect::{reconnect_loop, ReconnectOutcome};
use crate::registry::RoomRegistry;
use crate::rest::{JoinRequest, RestClient, RestError};

/// Capacity of the lifecycle-signal broadcast channel.
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// How often stale typing indicators are swept out.
const TYPING_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from session-level operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live connection; the command was not delivered.
    #[error("Not connected")]
    NotConnected,

    /// The connection dropped while the command was queued.
    #[error("Outbound channel closed")]
    ChannelClosed,

    /// The command could not be serialized.
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    /// A domain-level error from `homeroom_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A REST collaborator call failed.
    #[error(transparent)]
    Rest(#[from] RestError),
}

/// A failed send, carrying the original content back so the caller can
/// offer a retry without the user retyping anything.
#[derive(Debug, thiserror::Error)]
#[error("Send failed: {reason}")]
pub struct SendFailure {
    pub body: MessageBody,
    #[source]
    pub reason: SessionError,
}

/// All mutable state owned by one session. Guarded by a single lock;
/// the dispatcher and the session methods are the only writers.
pub(crate) struct SessionState {
    pub(crate) connection: ConnectionState,
    pub(crate) registry: RoomRegistry,
    pub(crate) timelines: HashMap<RoomId, RoomTimelines>,
    pub(crate) members: HashMap<RoomId, MemberRoster>,
    pub(crate) typing: TypingTracker,
    pub(crate) compose: HashMap<RoomId, ComposeState>,
    pub(crate) notifications: NotificationFeed,
    pub(crate) roster: PresenceRoster,
}

/// Handle to one authenticated realtime session.
///
/// Clones share all state; hand clones to whatever needs them instead
/// of stashing the session in a global.
#[derive(Clone)]
pub struct Session {
    config: SyncConfig,
    pub(crate) credential: Credential,
    connector: Arc<Connector>,
    rest: RestClient,
    signal_tx: broadcast::Sender<ConnectionSignal>,
    cancel: CancellationToken,
    pub(crate) state: Arc<RwLock<SessionState>>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<WsMessage>>>>,
}

impl Session {
    pub fn new(config: SyncConfig, credential: Credential) -> Self {
        let (signal_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let connector = Arc::new(Connector::new(config.ws_url.clone()));
        let rest = RestClient::new(config.api_url.clone(), credential.token.clone());
        let state = SessionState {
            connection: ConnectionState::Disconnected,
            registry: RoomRegistry::new(),
            timelines: HashMap::new(),
            members: HashMap::new(),
            typing: TypingTracker::new(config.typing_ttl_secs),
            compose: HashMap::new(),
            notifications: NotificationFeed::new(),
            roster: PresenceRoster::new(),
        };

        Self {
            config,
            credential,
            connector,
            rest,
            signal_tx,
            cancel: CancellationToken::new(),
            state: Arc::new(RwLock::new(state)),
            outbound: Arc::new(RwLock::new(None)),
        }
    }

    /// Subscribe to connection lifecycle signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionSignal> {
        self.signal_tx.subscribe()
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    // ---- connection lifecycle ----

    /// Establish the realtime channel and start the connection task.
    ///
    /// An auth rejection is terminal for this credential and is never
    /// retried automatically. A transient failure of this initial
    /// attempt is returned to the caller; automatic bounded retry only
    /// covers drops of an already-established connection.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.set_connection_state(ConnectionState::Connecting).await;

        match self.connector.connect(&self.credential).await {
            Ok(conn) => {
                let session = self.clone();
                let cancel = self.cancel.child_token();
                tokio::spawn(async move {
                    run_connection(session, conn, cancel).await;
                });
                Ok(())
            }
            Err(e @ ConnectError::AuthRejected { .. }) => {
                self.set_connection_state(ConnectionState::AuthFailed).await;
                self.emit(ConnectionSignal::AuthFailed);
                Err(e)
            }
            Err(e) => {
                self.set_connection_state(ConnectionState::Disconnected).await;
                Err(e)
            }
        }
    }

    /// Tear the session down: cancels the connection task, the
    /// typing-expiry sweep, and all in-flight collaborator calls. The
    /// session cannot be reconnected afterwards; build a new one.
    pub async fn disconnect(&self) {
        tracing::info!(user_id = self.credential.user_id, "Disconnecting session");
        self.cancel.cancel();
        *self.outbound.write().await = None;
        {
            let mut state = self.state.write().await;
            state.typing.clear();
            state.connection = ConnectionState::Disconnected;
        }
        self.emit(ConnectionSignal::Disconnected {
            reason: "disconnected by client".to_string(),
        });
    }

    /// Apply one inbound server event to the owned state.
    ///
    /// This is the single serialized entry point the read loop drives;
    /// embedders bringing their own transport call it directly.
    pub async fn apply_event(&self, event: ServerEvent) {
        dispatcher::apply(self, event).await;
    }

    // ---- rooms ----

    /// Join a room. Idempotent: joining an already-joined room is a
    /// no-op. While disconnected the join is recorded and issued on the
    /// next (re)connect, like any other rejoin.
    pub async fn join_room(&self, room_id: RoomId) {
        let newly_joined = self.state.write().await.registry.join(room_id);
        if !newly_joined {
            return;
        }
        match self.send_command(&ClientCommand::RoomJoin { room_id }).await {
            Ok(()) => self.spawn_history_fetch(room_id),
            Err(e) => {
                tracing::debug!(room_id, error = %e, "Join queued until next connect");
            }
        }
    }

    /// Leave a room: drops it from the rejoin set and discards its
    /// local timelines, members, and typing state.
    pub async fn leave_room(&self, room_id: RoomId) {
        let was_joined = {
            let mut state = self.state.write().await;
            let was_joined = state.registry.leave(room_id);
            if was_joined {
                state.timelines.remove(&room_id);
                state.members.remove(&room_id);
                state.typing.clear_room(room_id);
                state.compose.remove(&room_id);
            }
            was_joined
        };
        if !was_joined {
            return;
        }
        if let Err(e) = self.send_command(&ClientCommand::RoomLeave { room_id }).await {
            tracing::debug!(room_id, error = %e, "Leave command not delivered");
        }
    }

    /// Fetch and store a room's member list.
    pub async fn load_members(&self, room_id: RoomId) -> Result<(), SessionError> {
        let members = self.rest.fetch_members(room_id).await?;
        let roster = MemberRoster::from_members(room_id, members)?;
        self.state.write().await.members.insert(room_id, roster);
        Ok(())
    }

    /// Pending join requests for a room (leader view).
    pub async fn join_requests(&self, room_id: RoomId) -> Result<Vec<JoinRequest>, RestError> {
        self.rest.fetch_join_requests(room_id).await
    }

    // ---- messages ----

    /// Send a message to a room (or to one of its sub-event timelines).
    ///
    /// On failure the original body comes back in the error so the
    /// caller can retry; the content is never silently dropped.
    pub async fn send_message(
        &self,
        room_id: RoomId,
        body: MessageBody,
        event_id: Option<EventId>,
    ) -> Result<(), SendFailure> {
        if let Err(e) = validate_body(&body) {
            return Err(SendFailure {
                body,
                reason: e.into(),
            });
        }

        let command = ClientCommand::MessageSend {
            room_id,
            body: body.clone(),
            event_id,
        };
        if let Err(reason) = self.send_command(&command).await {
            return Err(SendFailure { body, reason });
        }

        // A successful send ends the compose burst.
        let stop = {
            let mut state = self.state.write().await;
            state
                .compose
                .entry(room_id)
                .or_default()
                .message_sent()
        };
        if stop == Some(ComposeSignal::Stop) {
            self.fire_typing(room_id, false).await;
        }
        Ok(())
    }

    /// Replace a message's content.
    pub async fn edit_message(
        &self,
        id: MessageId,
        body: MessageBody,
    ) -> Result<(), SendFailure> {
        if let Err(e) = validate_body(&body) {
            return Err(SendFailure {
                body,
                reason: e.into(),
            });
        }
        let command = ClientCommand::MessageEdit {
            id,
            body: body.clone(),
        };
        match self.send_command(&command).await {
            Ok(()) => Ok(()),
            Err(reason) => Err(SendFailure { body, reason }),
        }
    }

    /// Delete a message. The tombstone lands via the push stream.
    pub async fn delete_message(&self, id: MessageId) -> Result<(), SessionError> {
        self.send_command(&ClientCommand::MessageDelete { id }).await
    }

    // ---- typing ----

    /// Feed the current input text of a room's compose box. Emits
    /// `typing.start` only on the empty-to-non-empty transition and
    /// `typing.stop` on the way back -- never per keystroke. Delivery
    /// is best effort; a failed typing signal is logged and dropped.
    pub async fn input_changed(&self, room_id: RoomId, text: &str) {
        let signal = {
            let mut state = self.state.write().await;
            state
                .compose
                .entry(room_id)
                .or_default()
                .input_changed(text)
        };
        match signal {
            Some(ComposeSignal::Start) => self.fire_typing(room_id, true).await,
            Some(ComposeSignal::Stop) => self.fire_typing(room_id, false).await,
            None => {}
        }
    }

    // ---- notifications ----

    /// Fetch the notification backlog and recompute the unread count.
    pub async fn refresh_notifications(&self) -> Result<(), RestError> {
        let backlog = self.rest.fetch_notifications().await?;
        self.state.write().await.notifications.load_backlog(backlog);
        Ok(())
    }

    /// Open the notification panel: the displayed unread count drops to
    /// zero immediately and a bulk mark-all-read is issued upstream,
    /// fire-and-forget. A failure is logged; the local zeroing stands
    /// (last writer wins, no rollback).
    pub async fn open_notifications(&self) {
        let issue_bulk = self.state.write().await.notifications.open_panel();
        if !issue_bulk {
            return;
        }
        let rest = self.rest.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = rest.mark_all_read() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Bulk mark-read failed");
                    }
                }
            }
        });
    }

    /// Close the notification panel. No refetch happens on reopen.
    pub async fn close_notifications(&self) {
        self.state.write().await.notifications.close_panel();
    }

    /// Click a notification: flips its local read flag, issues the
    /// per-item mark-read upstream when it was unread (fire-and-forget,
    /// independent of the bulk call), and resolves where to navigate.
    pub async fn click_notification(&self, id: NotificationId) -> Option<NavigationTarget> {
        let (needs_request, target) = {
            let mut state = self.state.write().await;
            let needs_request = state.notifications.mark_read(id);
            let target = state
                .notifications
                .get(id)
                .and_then(|n| n.navigation_target());
            (needs_request, target)
        };

        if needs_request {
            let rest = self.rest.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = rest.mark_read(id) => {
                        if let Err(e) = result {
                            tracing::warn!(notification_id = id, error = %e, "Mark-read failed");
                        }
                    }
                }
            });
        }
        target
    }

    // ---- snapshots ----

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// The rooms currently held for rejoin, in unspecified order.
    pub async fn joined_rooms(&self) -> Vec<RoomId> {
        self.state.read().await.registry.joined_rooms()
    }

    /// A room's primary timeline, oldest first. `None` when no timeline
    /// exists for the room yet; live messages that arrived before the
    /// history fetch completed are included.
    pub async fn timeline_messages(&self, room_id: RoomId) -> Option<Vec<Message>> {
        let state = self.state.read().await;
        Some(state.timelines.get(&room_id)?.primary().messages().to_vec())
    }

    /// Whether the room's history fetch has succeeded. `false` means
    /// "not loaded" -- a failed fetch never masquerades as an empty room.
    pub async fn is_timeline_loaded(&self, room_id: RoomId) -> bool {
        self.state
            .read()
            .await
            .timelines
            .get(&room_id)
            .is_some_and(|t| t.primary().is_loaded())
    }

    /// A sub-event's timeline within a room, oldest first.
    pub async fn event_timeline_messages(
        &self,
        room_id: RoomId,
        event_id: EventId,
    ) -> Option<Vec<Message>> {
        let state = self.state.read().await;
        Some(
            state
                .timelines
                .get(&room_id)?
                .event_timeline(event_id)?
                .messages()
                .to_vec(),
        )
    }

    /// Display names currently typing in a room, unordered. Any cap on
    /// how many to render is the view's business.
    pub async fn typing_users(&self, room_id: RoomId) -> Vec<String> {
        self.state.read().await.typing.typing_in(room_id)
    }

    /// Snapshot of the global online roster, unordered.
    pub async fn online_users(&self) -> Vec<String> {
        self.state.read().await.roster.online_users()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.entries().to_vec()
    }

    pub async fn unread_count(&self) -> usize {
        self.state.read().await.notifications.unread_count()
    }

    pub async fn room_members(&self, room_id: RoomId) -> Vec<RoomMember> {
        self.state
            .read()
            .await
            .members
            .get(&room_id)
            .map(|roster| roster.members().to_vec())
            .unwrap_or_default()
    }

    // ---- internals ----

    pub(crate) fn emit(&self, signal: ConnectionSignal) {
        // Ignore the SendError -- it only means there are no subscribers.
        let _ = self.signal_tx.send(signal);
    }

    async fn set_connection_state(&self, connection: ConnectionState) {
        self.state.write().await.connection = connection;
    }

    async fn send_command(&self, command: &ClientCommand) -> Result<(), SessionError> {
        let encoded = encode_command(command)?;
        let outbound = self.outbound.read().await;
        let Some(tx) = outbound.as_ref() else {
            return Err(SessionError::NotConnected);
        };
        tx.send(WsMessage::Text(encoded))
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn fire_typing(&self, room_id: RoomId, start: bool) {
        let command = if start {
            ClientCommand::TypingStart { room_id }
        } else {
            ClientCommand::TypingStop { room_id }
        };
        if let Err(e) = self.send_command(&command).await {
            tracing::debug!(room_id, error = %e, "Typing signal not delivered");
        }
    }

    /// Spawn the one-shot history fetch for a newly joined room. The
    /// task is abandoned (without touching state) if the session is
    /// torn down first.
    fn spawn_history_fetch(&self, room_id: RoomId) {
        let rest = self.rest.clone();
        let state = Arc::clone(&self.state);
        let page_size = self.config.history_page_size;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = rest.fetch_history(room_id, page_size, None) => result,
            };
            if cancel.is_cancelled() {
                return;
            }
            match result {
                Ok(page) => {
                    let mut state = state.write().await;
                    state
                        .timelines
                        .entry(room_id)
                        .or_insert_with(|| RoomTimelines::new(room_id))
                        .load_history(page.messages);
                    state.registry.mark_fetched(room_id);
                    tracing::debug!(room_id, "Room history loaded");
                }
                Err(e) => {
                    tracing::warn!(
                        room_id,
                        error = %e,
                        "History fetch failed; timeline left unloaded",
                    );
                }
            }
        });
    }

    /// Re-issue `room.join` for every held room and kick off history
    /// fetches for rooms that never got one. Called on every successful
    /// (re)connect -- the transport itself never rejoins anything.
    async fn rejoin_and_fetch(&self, tx: &mpsc::UnboundedSender<WsMessage>) {
        let (rooms, need_fetch) = {
            let state = self.state.read().await;
            (
                state.registry.joined_rooms(),
                state.registry.rooms_needing_fetch(),
            )
        };

        for room_id in rooms {
            match encode_command(&ClientCommand::RoomJoin { room_id }) {
                Ok(encoded) => {
                    let _ = tx.send(WsMessage::Text(encoded));
                }
                Err(e) => tracing::error!(room_id, error = %e, "Failed to encode join"),
            }
        }
        for room_id in need_fetch {
            self.spawn_history_fetch(room_id);
        }
    }
}

/// Core connection loop: drive the stream, then reconnect with bounded
/// backoff until cancelled, auth-rejected, or out of attempts.
async fn run_connection(session: Session, mut conn: Connection, cancel: CancellationToken) {
    let sweep_cancel = cancel.child_token();
    spawn_typing_sweep(session.clone(), sweep_cancel.clone());

    loop {
        drive_connection(&session, conn, &cancel).await;

        // The connection is down: nothing outbound can be delivered and
        // every typing indicator is stale.
        *session.outbound.write().await = None;
        session.state.write().await.typing.clear();

        if cancel.is_cancelled() {
            break;
        }

        session
            .set_connection_state(ConnectionState::Reconnecting)
            .await;
        tracing::info!("Connection lost, entering reconnect loop");

        match reconnect_loop(
            &session.connector,
            &session.credential,
            &session.config.reconnect,
            &cancel,
        )
        .await
        {
            ReconnectOutcome::Reconnected(next) => conn = next,
            ReconnectOutcome::AuthRejected => {
                session.set_connection_state(ConnectionState::AuthFailed).await;
                session.emit(ConnectionSignal::AuthFailed);
                break;
            }
            ReconnectOutcome::GaveUp => {
                session
                    .set_connection_state(ConnectionState::Disconnected)
                    .await;
                session.emit(ConnectionSignal::Disconnected {
                    reason: "reconnect attempts exhausted".to_string(),
                });
                break;
            }
            ReconnectOutcome::Cancelled => break,
        }
    }

    sweep_cancel.cancel();
    tracing::info!("Connection task exited");
}

/// Drive a single live connection until it drops or is cancelled.
async fn drive_connection(session: &Session, conn: Connection, cancel: &CancellationToken) {
    let (mut sink, mut stream) = conn.ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    *session.outbound.write().await = Some(tx.clone());
    session.set_connection_state(ConnectionState::Connected).await;
    session.emit(ConnectionSignal::Connected);
    session.rejoin_and_fetch(&tx).await;

    // Writer task: forward queued commands to the sink.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!("WebSocket sink closed");
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match parse_event(&text) {
                    Ok(event) => session.apply_event(event).await,
                    Err(e) => {
                        // One bad frame never stops the stream.
                        tracing::warn!(error = %e, raw_frame = %text, "Dropped malformed event");
                    }
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::info!(?frame, "Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite; the protocol
                    // has no binary frames.
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            }
        }
    }

    writer.abort();
}

/// Periodic sweep that expires typing indicators whose TTL lapsed
/// without a refresh. Cancelled together with the connection, so no
/// expiry can fire into a torn-down session.
fn spawn_typing_sweep(session: Session, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TYPING_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    let expired = session.state.write().await.typing.expire(Utc::now());
                    for (room_id, user_name) in expired {
                        tracing::debug!(room_id, user_name = %user_name, "Typing indicator expired");
                    }
                }
            }
        }
    });
}
