//! Day and burst separators for rendering a timeline.
//!
//! Presentation helpers layered on top of the ordered message sequence;
//! they never affect the ordering invariant itself.

use chrono::Duration;

use crate::message::Message;

/// Maximum gap between two messages rendered as one burst.
pub const BURST_MAX_GAP_MINS: i64 = 30;

/// Whether a day separator belongs before `next`.
pub fn needs_day_separator(prev: Option<&Message>, next: &Message) -> bool {
    match prev {
        Some(prev) => prev.created_at.date_naive() != next.created_at.date_naive(),
        None => true,
    }
}

/// Whether `next` opens a new burst: first message, a new calendar day,
/// or more than [`BURST_MAX_GAP_MINS`] minutes after the previous one.
pub fn starts_new_burst(prev: Option<&Message>, next: &Message) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    if prev.created_at.date_naive() != next.created_at.date_naive() {
        return true;
    }
    next.created_at.signed_duration_since(prev.created_at) > Duration::minutes(BURST_MAX_GAP_MINS)
}
