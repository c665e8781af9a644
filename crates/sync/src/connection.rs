//! Authenticated WebSocket connection to the realtime endpoint.
//!
//! [`Connector`] holds the endpoint configuration; calling
//! [`Connector::connect`] with a [`Credential`] establishes a live
//! [`Connection`]. A handshake rejected with 401/403 surfaces as
//! [`ConnectError::AuthRejected`], distinguishable from transient
//! transport failure so that callers never retry a bad credential.

use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

use homeroom_core::types::UserId;

/// The authenticated identity a session runs as.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: UserId,
    pub display_name: String,
    /// Avatar reference shown next to the user's messages, if any.
    pub avatar_url: Option<String>,
    /// Bearer token presented during the WebSocket handshake and on
    /// every REST call.
    pub token: String,
}

/// Observable lifecycle state of the session's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    AuthFailed,
}

/// Lifecycle signals emitted to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// The channel is up -- emitted on the first connect and on every
    /// successful reconnect.
    Connected,
    /// The channel is down and no further retry will be made.
    Disconnected { reason: String },
    /// The credential was rejected. Terminal for this credential; the
    /// session owner must obtain a fresh one.
    AuthFailed,
}

/// Errors establishing the realtime channel.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The server rejected the credential during the handshake.
    #[error("Credential rejected (HTTP {status})")]
    AuthRejected { status: u16 },

    /// Transport-level failure (DNS, TCP, TLS, protocol).
    #[error("Connection error: {0}")]
    Transport(String),
}

/// Endpoint configuration for the realtime channel.
pub struct Connector {
    ws_url: String,
}

/// A live WebSocket connection.
pub struct Connection {
    /// Unique client id sent during the handshake, for server-side
    /// correlation.
    pub client_id: String,
    /// The raw stream for reading/writing frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl Connector {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the realtime endpoint as the given credential.
    ///
    /// Generates a fresh client id (UUID v4) and passes it with the
    /// bearer token as handshake query parameters.
    pub async fn connect(&self, credential: &Credential) -> Result<Connection, ConnectError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!(
            "{}?token={}&clientId={}",
            self.ws_url, credential.token, client_id
        );

        match connect_async(&url).await {
            Ok((ws_stream, _response)) => {
                tracing::info!(
                    user_id = credential.user_id,
                    client_id = %client_id,
                    "Connected to realtime endpoint at {}",
                    self.ws_url,
                );
                Ok(Connection {
                    client_id,
                    ws_stream,
                })
            }
            Err(tokio_tungstenite::tungstenite::Error::Http(response))
                if response.status() == StatusCode::UNAUTHORIZED
                    || response.status() == StatusCode::FORBIDDEN =>
            {
                Err(ConnectError::AuthRejected {
                    status: response.status().as_u16(),
                })
            }
            Err(e) => Err(ConnectError::Transport(format!(
                "Failed to connect to {}: {e}",
                self.ws_url
            ))),
        }
    }
}
