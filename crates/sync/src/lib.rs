//! Async session layer for the homeroom realtime core.
//!
//! Owns the authenticated WebSocket connection (with bounded
//! reconnection), the joined-room registry, the REST collaborator
//! client, and the [`Session`](session::Session) object that holds all
//! per-session mutable state behind a single lock. Inbound events flow
//! through one serialized dispatcher; outbound commands are discrete
//! calls that surface their errors.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod reconnect;
pub mod registry;
pub mod rest;
pub mod session;
