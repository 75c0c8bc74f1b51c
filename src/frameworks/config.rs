use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("ARENA_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

/// Game length applied when a create request omits `duration_seconds`.
pub fn default_session_duration() -> Duration {
    let secs = env::var("SESSION_DURATION_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(300);
    Duration::from_secs(secs)
}

pub const EVENT_CHANNEL_CAPACITY: usize = 128;

// Countdown cadence: one tick per second, decoupled from however fast
// clients send moves (those apply immediately on request).
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
