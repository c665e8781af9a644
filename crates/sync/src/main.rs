//! `homeroom-sync` -- realtime session watcher.
//!
//! Connects to the homeroom backend as a single user, joins the
//! configured rooms, and logs lifecycle signals as they happen. Handy
//! for smoke-testing a deployment from a terminal.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default   | Description                          |
//! |-------------------------|----------|-----------|--------------------------------------|
//! | `HOMEROOM_TOKEN`        | yes      | --        | Bearer token for this session        |
//! | `HOMEROOM_USER_ID`      | yes      | --        | Integer id of the authenticated user |
//! | `HOMEROOM_DISPLAY_NAME` | no       | `watcher` | Display name for typing signals      |
//! | `HOMEROOM_ROOMS`        | no       | (empty)   | Comma-separated room ids to join     |
//!
//! Endpoint and tuning variables are documented on
//! [`SyncConfig::from_env`].

use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homeroom_core::types::RoomId;
use homeroom_sync::config::SyncConfig;
use homeroom_sync::connection::Credential;
use homeroom_sync::session::Session;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeroom_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let token = std::env::var("HOMEROOM_TOKEN").unwrap_or_else(|_| {
        tracing::error!("HOMEROOM_TOKEN environment variable is required");
        std::process::exit(1);
    });

    let user_id: i64 = std::env::var("HOMEROOM_USER_ID")
        .unwrap_or_else(|_| {
            tracing::error!("HOMEROOM_USER_ID environment variable is required");
            std::process::exit(1);
        })
        .parse()
        .unwrap_or_else(|_| {
            tracing::error!("HOMEROOM_USER_ID must be a valid integer");
            std::process::exit(1);
        });

    let display_name =
        std::env::var("HOMEROOM_DISPLAY_NAME").unwrap_or_else(|_| "watcher".into());

    let rooms: Vec<RoomId> = std::env::var("HOMEROOM_ROOMS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let config = SyncConfig::from_env();
    tracing::info!(
        ws_url = %config.ws_url,
        api_url = %config.api_url,
        user_id,
        "Starting homeroom session watcher",
    );

    let credential = Credential {
        user_id,
        display_name,
        avatar_url: None,
        token,
    };
    let session = Session::new(config, credential);
    let mut signals = session.subscribe();

    if let Err(e) = session.connect().await {
        tracing::error!(error = %e, "Initial connect failed");
        std::process::exit(1);
    }

    for room_id in rooms {
        session.join_room(room_id).await;
    }

    if let Err(e) = session.refresh_notifications().await {
        tracing::warn!(error = %e, "Notification backlog fetch failed");
    }
    tracing::info!(unread = session.unread_count().await, "Backlog loaded");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.disconnect().await;
                break;
            }
            signal = signals.recv() => match signal {
                Ok(signal) => tracing::info!(?signal, "Connection signal"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Signal stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
