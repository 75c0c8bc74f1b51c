// Use-case level events flowing from session operations to subscribers.

use crate::domain::SessionSnapshot;

/// Everything a session can tell its subscribers. Fan-out is total: every
/// connection subscribed to the session observes every event, not just the
/// one that caused it.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A move was applied to a player.
    Moved {
        player_id: String,
        x: f32,
        y: f32,
        energy: f32,
    },
    /// A commit was recorded for a player (explicit action or commit-node).
    Committed {
        player_id: String,
        commits: u64,
        score: u64,
    },
    /// Periodic (or join-triggered) full-state broadcast.
    StateUpdate(SessionSnapshot),
    /// Terminal broadcast; the snapshot carries the winner and final scores.
    Ended(SessionSnapshot),
}
