// Per-session loop task and the channel bundle handed to transports.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tracing::info;

use crate::domain::{Session, TickOutcome};
use crate::use_cases::types::SessionEvent;

/// Shared configuration for spawning session loops.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity for broadcast session events.
    pub event_channel_capacity: usize,
    /// Fixed cadence of the countdown loop (1 second in production; tests
    /// shrink it to keep timer-driven scenarios fast).
    pub tick_interval: Duration,
    /// Game length applied when a create request does not specify one.
    pub default_duration: Duration,
}

/// Per-session channels and shared state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Identifier clients use to target this session.
    pub session_id: Arc<str>,
    /// The session aggregate; the single serialization point for all of its
    /// mutations (inbound operations and the loop tick both lock it).
    pub state: Arc<Mutex<Session>>,
    /// Broadcast sender for domain-level session events.
    pub events_tx: broadcast::Sender<SessionEvent>,
    /// Broadcast sender for serialized events, shared across connections.
    pub event_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized full snapshot.
    pub latest_tx: watch::Sender<Utf8Bytes>,
    /// Cancels the session loop on explicit teardown.
    pub shutdown: Arc<Notify>,
}

/// Drives one session's countdown: one tick per interval while `Playing`,
/// a full-state broadcast every fifth tick, and a single terminal `Ended`
/// broadcast once the timer hits zero. Exits on end of game or shutdown,
/// whichever comes first; it never ticks an ended session.
pub async fn session_task(
    state: Arc<Mutex<Session>>,
    events_tx: broadcast::Sender<SessionEvent>,
    shutdown: Arc<Notify>,
    tick_interval: Duration,
) {
    let mut interval = tokio::time::interval(tick_interval);
    // The first interval fire completes immediately; consume it so the
    // countdown starts a full interval after session creation.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let session_id = state.lock().await.id.clone();
                info!(%session_id, "session loop cancelled");
                break;
            }
            _ = interval.tick() => {
                let (outcome, event) = {
                    let mut session = state.lock().await;
                    let outcome = session.advance_tick();
                    let event = match &outcome {
                        TickOutcome::Broadcast => {
                            Some(SessionEvent::StateUpdate(session.snapshot()))
                        }
                        TickOutcome::Ended { .. } => {
                            Some(SessionEvent::Ended(session.snapshot()))
                        }
                        TickOutcome::Advanced | TickOutcome::Idle => None,
                    };
                    (outcome, event)
                };

                if let Some(event) = event {
                    // Send failures only mean nobody is subscribed right now.
                    let _ = events_tx.send(event);
                }

                match outcome {
                    TickOutcome::Ended { winner_id } => {
                        let session_id = state.lock().await.id.clone();
                        info!(%session_id, winner_id = ?winner_id, "session ended");
                        break;
                    }
                    // The session went terminal without this loop noticing
                    // its own end; stop rather than idle forever.
                    TickOutcome::Idle => break,
                    TickOutcome::Advanced | TickOutcome::Broadcast => {}
                }
            }
        }
    }
}
