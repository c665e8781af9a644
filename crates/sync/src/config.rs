use homeroom_core::typing::DEFAULT_TYPING_TTL_SECS;

use crate::reconnect::ReconnectConfig;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In
/// production, override via environment variables.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Realtime WebSocket endpoint (default: `ws://localhost:3000/ws`).
    pub ws_url: String,
    /// REST base URL (default: `http://localhost:3000/api`).
    pub api_url: String,
    /// Seconds a typing indicator stays visible without a refresh.
    pub typing_ttl_secs: u64,
    /// Page size for room history fetches (default: `50`).
    pub history_page_size: u32,
    /// Backoff and attempt ceiling for automatic reconnection.
    pub reconnect: ReconnectConfig,
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                     |
    /// |-----------------------------|-----------------------------|
    /// | `HOMEROOM_WS_URL`           | `ws://localhost:3000/ws`    |
    /// | `HOMEROOM_API_URL`          | `http://localhost:3000/api` |
    /// | `HOMEROOM_TYPING_TTL_SECS`  | `6`                         |
    /// | `HOMEROOM_HISTORY_PAGE_SIZE`| `50`                        |
    pub fn from_env() -> Self {
        let ws_url =
            std::env::var("HOMEROOM_WS_URL").unwrap_or_else(|_| "ws://localhost:3000/ws".into());

        let api_url = std::env::var("HOMEROOM_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000/api".into());

        let typing_ttl_secs: u64 = std::env::var("HOMEROOM_TYPING_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_TYPING_TTL_SECS.to_string())
            .parse()
            .expect("HOMEROOM_TYPING_TTL_SECS must be a valid u64");

        let history_page_size: u32 = std::env::var("HOMEROOM_HISTORY_PAGE_SIZE")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("HOMEROOM_HISTORY_PAGE_SIZE must be a valid u32");

        Self {
            ws_url,
            api_url,
            typing_ttl_secs,
            history_page_size,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:3000/ws".into(),
            api_url: "http://localhost:3000/api".into(),
            typing_ttl_secs: DEFAULT_TYPING_TTL_SECS,
            history_page_size: 50,
            reconnect: ReconnectConfig::default(),
        }
    }
}
