//! REST collaborator client.
//!
//! Wraps the backend's HTTP endpoints consumed by the realtime core:
//! room history pages, the notification backlog, bulk and per-item
//! mark-read, room member lists, and join requests. Any non-success
//! response surfaces as [`RestError::Api`] and causes no local state
//! change in the caller.

use serde::Deserialize;

use homeroom_core::membership::RoomMember;
use homeroom_core::message::Message;
use homeroom_core::notification::Notification;
use homeroom_core::types::{MessageId, NotificationId, RoomId, Timestamp, UserId};

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// One page of a room's message history, newest page first.
#[derive(Debug, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    /// Cursor for the next (older) page, when one exists.
    #[serde(default)]
    pub next_before: Option<MessageId>,
}

/// A pending request to join a room.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub user_id: UserId,
    pub display_name: String,
    pub requested_at: Timestamp,
}

/// Bearer-authenticated HTTP client for the backend.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl RestClient {
    pub fn new(api_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            token,
        }
    }

    /// Fetch one page of a room's message history.
    ///
    /// `before` pages backwards: only messages older than the given id
    /// are returned.
    pub async fn fetch_history(
        &self,
        room_id: RoomId,
        limit: u32,
        before: Option<MessageId>,
    ) -> Result<HistoryPage, RestError> {
        let mut request = self
            .client
            .get(format!("{}/rooms/{room_id}/messages", self.api_url))
            .bearer_auth(&self.token)
            .query(&[("limit", limit)]);
        if let Some(before) = before {
            request = request.query(&[("before", before)]);
        }

        let response = request.send().await?;
        Self::parse_response(response).await
    }

    /// Fetch the full notification backlog for this session.
    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>, RestError> {
        let response = self
            .client
            .get(format!("{}/notifications", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Mark every notification read.
    pub async fn mark_all_read(&self) -> Result<(), RestError> {
        let response = self
            .client
            .post(format!("{}/notifications/read-all", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Mark a single notification read.
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), RestError> {
        let response = self
            .client
            .post(format!("{}/notifications/{id}/read", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Fetch a room's member list.
    pub async fn fetch_members(&self, room_id: RoomId) -> Result<Vec<RoomMember>, RestError> {
        let response = self
            .client
            .get(format!("{}/rooms/{room_id}/members", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch the pending join requests for a room (leader view).
    pub async fn fetch_join_requests(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<JoinRequest>, RestError> {
        let response = self
            .client
            .get(format!("{}/rooms/{room_id}/join-requests", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or produce a
    /// [`RestError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RestError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RestError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert a success status, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), RestError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
