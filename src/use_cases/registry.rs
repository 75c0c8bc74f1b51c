// Session registry: creates sessions, spawns their loops, and routes
// player-keyed operations to the owning session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use rand::thread_rng;
use tokio::sync::{Mutex, Notify, RwLock, broadcast, watch};
use tracing::info;

use crate::domain::{
    CommitReceipt, MoveOutcome, Phase, PlayerSnapshot, Session, SessionSnapshot, nodes, tuning,
};
use crate::use_cases::session::{SessionHandle, SessionSettings, session_task};
use crate::use_cases::types::SessionEvent;

/// Errors returned by registry operations. All are local and recoverable;
/// none affect other sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// No session with the given id.
    SessionNotFound,
    /// The session exists but is not in a joinable phase.
    SessionNotJoinable,
    /// The player id has no active session mapping.
    PlayerNotFound,
    /// Requested game length was zero or negative.
    InvalidDuration,
    /// Non-finite move coordinates. Rejected rather than clamped so client
    /// bugs surface instead of being masked.
    InvalidCoordinates,
}

/// Thread-safe registry for active sessions.
pub struct SessionRegistry {
    /// Global settings applied to newly created sessions.
    settings: SessionSettings,
    /// Map of session id to active handle.
    sessions: RwLock<HashMap<String, SessionHandle>>,
    /// Weak lookup index from player id to owning session id. Never an
    /// ownership relation; the session owns its players.
    players: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
            players: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.settings.default_duration
    }

    /// Creates a new session under `session_id` (callers allocate ids via
    /// `utils::rng::session_id`, which is process-unique), generates its node
    /// set, spawns the owner at the arena center, and starts the loop task.
    pub async fn create_session(
        &self,
        session_id: String,
        owner_id: &str,
        owner_name: &str,
        duration_seconds: i64,
    ) -> Result<(SessionHandle, SessionSnapshot), RegistryError> {
        if duration_seconds <= 0 {
            return Err(RegistryError::InvalidDuration);
        }
        let duration = Duration::from_secs(duration_seconds as u64);

        let generated = nodes::generate(
            tuning::SESSION_NODE_COUNT,
            tuning::ArenaBounds::default(),
            &mut thread_rng(),
        );
        let mut session = Session::new(session_id.clone(), duration, generated);
        let (cx, cy) = session.bounds.center();
        session.add_player(owner_id, owner_name, cx, cy);
        session.start();
        let snapshot = session.snapshot();

        // Channel wiring for the session loop and its subscribers.
        let (events_tx, _events_rx) =
            broadcast::channel::<SessionEvent>(self.settings.event_channel_capacity);
        let (event_bytes_tx, _event_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.event_channel_capacity);
        let (latest_tx, _latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let shutdown = Arc::new(Notify::new());

        let state = Arc::new(Mutex::new(session));

        // Spawn the authoritative countdown loop for this session.
        tokio::spawn(session_task(
            state.clone(),
            events_tx.clone(),
            shutdown.clone(),
            self.settings.tick_interval,
        ));

        let handle = SessionHandle {
            session_id: Arc::from(session_id.as_str()),
            state,
            events_tx,
            event_bytes_tx,
            latest_tx,
            shutdown,
        };

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());
        self.players
            .write()
            .await
            .insert(owner_id.to_string(), session_id.clone());

        info!(%session_id, owner_id, duration_seconds, "session created");
        Ok((handle, snapshot))
    }

    /// Returns a session handle for the provided id, if it exists.
    pub async fn get_session(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Returns the handle owning the given player, if any.
    pub async fn session_for_player(&self, player_id: &str) -> Option<SessionHandle> {
        let session_id = {
            let players = self.players.read().await;
            players.get(player_id).cloned()?
        };
        self.get_session(&session_id).await
    }

    /// Joins a player into a running session at a random interior point, or
    /// re-attaches to the player's existing record. Everyone subscribed sees
    /// the roster change through a full-state broadcast.
    pub async fn join_session(
        &self,
        session_id: &str,
        player_id: &str,
        player_name: &str,
    ) -> Result<(PlayerSnapshot, SessionSnapshot), RegistryError> {
        let handle = self
            .get_session(session_id)
            .await
            .ok_or(RegistryError::SessionNotFound)?;

        let (player, snapshot) = {
            let mut session = handle.state.lock().await;
            if session.phase != Phase::Playing {
                return Err(RegistryError::SessionNotJoinable);
            }
            let (x, y) = nodes::spawn_point(session.bounds, &mut thread_rng());
            let player = session.add_player(player_id, player_name, x, y);
            (player, session.snapshot())
        };

        self.players
            .write()
            .await
            .insert(player_id.to_string(), session_id.to_string());

        info!(%session_id, player_id, "player joined");
        let _ = handle.events_tx.send(SessionEvent::StateUpdate(snapshot.clone()));
        Ok((player, snapshot))
    }

    /// Applies a move for the player. Sub-threshold displacements and moves
    /// against an ended session are ignored without error; only applied
    /// moves emit a `Moved` event.
    pub async fn move_player(
        &self,
        player_id: &str,
        x: f32,
        y: f32,
    ) -> Result<MoveOutcome, RegistryError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(RegistryError::InvalidCoordinates);
        }

        let handle = self
            .session_for_player(player_id)
            .await
            .ok_or(RegistryError::PlayerNotFound)?;

        let outcome = {
            let mut session = handle.state.lock().await;
            session
                .apply_move(player_id, x, y)
                .ok_or(RegistryError::PlayerNotFound)?
        };

        if let MoveOutcome::Applied(player) = &outcome {
            let _ = handle.events_tx.send(SessionEvent::Moved {
                player_id: player.id.clone(),
                x: player.x,
                y: player.y,
                energy: player.energy,
            });
        }
        Ok(outcome)
    }

    /// Records an explicit commit for the player: fixed score reward plus
    /// session-wide counters. A commit against an ended session is a no-op.
    pub async fn commit(&self, player_id: &str) -> Result<CommitReceipt, RegistryError> {
        let handle = self
            .session_for_player(player_id)
            .await
            .ok_or(RegistryError::PlayerNotFound)?;

        let (receipt, applied) = {
            let mut session = handle.state.lock().await;
            let applied = session.phase == Phase::Playing;
            let receipt = session
                .record_commit(player_id)
                .ok_or(RegistryError::PlayerNotFound)?;
            (receipt, applied)
        };

        if applied {
            let _ = handle.events_tx.send(SessionEvent::Committed {
                player_id: receipt.player.id.clone(),
                commits: receipt.player.commits,
                score: receipt.player.score,
            });
        }
        Ok(receipt)
    }

    /// Read-only projection of the full session state.
    pub async fn get_snapshot(&self, session_id: &str) -> Result<SessionSnapshot, RegistryError> {
        let handle = self
            .get_session(session_id)
            .await
            .ok_or(RegistryError::SessionNotFound)?;
        let session = handle.state.lock().await;
        Ok(session.snapshot())
    }

    /// Explicit teardown: stops the loop before the handle leaves the map so
    /// no dangling timer can mutate a removed session, then drops the
    /// player-index entries that pointed at it.
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            match sessions.remove(session_id) {
                Some(handle) => {
                    handle.shutdown.notify_one();
                    true
                }
                None => false,
            }
        };
        if removed {
            self.players
                .write()
                .await
                .retain(|_, owner| owner != session_id);
            info!(%session_id, "session removed");
        }
        removed
    }
}
