//! Pure domain state for the homeroom realtime core.
//!
//! Everything in this crate is synchronous and runtime-free: the wire
//! protocol types, the message timeline merge/edit/delete state machine,
//! typing presence, the notification feed, the global presence roster,
//! and room membership rules. The async connection and session layer
//! lives in `homeroom-sync`.

pub mod error;
pub mod grouping;
pub mod membership;
pub mod message;
pub mod notification;
pub mod presence;
pub mod protocol;
pub mod timeline;
pub mod types;
pub mod typing;
