// Domain-level session state: players, collectible nodes, timer, and the
// phase machine. All mutation paths for a single session live here; callers
// are responsible for serializing access (one session, one lock).

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::domain::collision::{self, CollisionEffect};
use crate::domain::tuning::{
    ArenaBounds, COMMIT_SCORE, COMMIT_WORLD_ENERGY, MAX_ENERGY, MOVE_ENERGY_COST,
    MOVE_THROTTLE_DISTANCE, PLAYER_PALETTE, START_ENERGY, WORLD_ENERGY_BASELINE,
};

/// Lifecycle of a session. Transitions only move forward
/// (`Waiting -> Playing -> Ended`); `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Playing,
    Ended,
}

/// Reward behavior of a collectible node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Restores player energy by `value`, clamped to the energy cap.
    Energy,
    /// Triggers the same accounting as an explicit commit action.
    Commit,
    /// Adds `value` to the player's score.
    Powerup,
    /// Adds `value` to the score *and* one commit. Distinct from `Commit`:
    /// no fixed commit reward or session counters, a direct value grant.
    Blockchain,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub energy: f32,
    pub score: u64,
    pub commits: u64,
    pub is_alive: bool,
    pub color: String,
    /// Unix millis of the last applied action, for client-side staleness cues.
    pub last_action: u64,
    /// Join order within the session; the documented winner tie-break.
    pub joined_seq: u64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub kind: NodeKind,
    pub value: u32,
    pub radius: f32,
    /// One-way flag: flips to false on first capture and never back.
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub energy: f32,
    pub score: u64,
    pub commits: u64,
    pub is_alive: bool,
    pub color: String,
    pub last_action: u64,
}

#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub kind: NodeKind,
    pub value: u32,
    pub radius: f32,
    pub is_active: bool,
}

/// Read-only projection of a full session, safe to hand to transports.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub tick: u64,
    pub time_left: u32,
    pub world_energy: u32,
    pub total_commits: u64,
    pub winner_id: Option<String>,
    pub players: Vec<PlayerSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            x: p.x,
            y: p.y,
            energy: p.energy,
            score: p.score,
            commits: p.commits,
            is_alive: p.is_alive,
            color: p.color.clone(),
            last_action: p.last_action,
        }
    }
}

impl From<&Node> for NodeSnapshot {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id.clone(),
            x: n.x,
            y: n.y,
            kind: n.kind,
            value: n.value,
            radius: n.radius,
            is_active: n.is_active,
        }
    }
}

/// Result of a move request against a session.
#[derive(Debug, Clone)]
pub enum MoveOutcome {
    /// The move was applied; carries the post-move player state.
    Applied(PlayerSnapshot),
    /// Coalesced away (sub-threshold displacement) or the session is no
    /// longer playing. No state changed.
    Ignored(PlayerSnapshot),
}

/// Result of one loop tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Timer advanced, nothing to tell subscribers yet.
    Advanced,
    /// Timer advanced and a periodic full-state broadcast is due.
    Broadcast,
    /// The countdown hit zero this tick; the session is now `Ended`.
    Ended { winner_id: Option<String> },
    /// The session was already terminal; nothing happened.
    Idle,
}

/// Post-commit counters returned to the caller for event emission.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub player: PlayerSnapshot,
    pub total_commits: u64,
    pub world_energy: u32,
}

/// Broadcast a full snapshot every N ticks while playing.
pub const BROADCAST_EVERY_TICKS: u64 = 5;

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub bounds: ArenaBounds,
    pub phase: Phase,
    pub tick: u64,
    pub time_left: u32,
    pub world_energy: u32,
    pub total_commits: u64,
    pub winner_id: Option<String>,
    pub players: HashMap<String, Player>,
    pub nodes: HashMap<String, Node>,
    next_joined_seq: u64,
}

impl Session {
    /// Creates a session in `Waiting` with its generated node set.
    pub fn new(id: String, duration: Duration, nodes: Vec<Node>) -> Self {
        Self {
            id,
            bounds: ArenaBounds::default(),
            phase: Phase::Waiting,
            tick: 0,
            time_left: duration.as_secs() as u32,
            world_energy: WORLD_ENERGY_BASELINE,
            total_commits: 0,
            winner_id: None,
            players: HashMap::new(),
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            next_joined_seq: 0,
        }
    }

    /// Moves `Waiting -> Playing`. A no-op in any other phase.
    pub fn start(&mut self) {
        if self.phase == Phase::Waiting {
            self.phase = Phase::Playing;
        }
    }

    /// Inserts a player at the given point, or re-attaches to an existing
    /// player with the same id (disconnects never remove players, so a
    /// returning client finds its old state intact).
    pub fn add_player(&mut self, id: &str, name: &str, x: f32, y: f32) -> PlayerSnapshot {
        if let Some(existing) = self.players.get(id) {
            return PlayerSnapshot::from(existing);
        }

        let (x, y) = self.bounds.clamp(x, y);
        let seq = self.next_joined_seq;
        self.next_joined_seq += 1;
        let player = Player {
            id: id.to_string(),
            name: name.to_string(),
            x,
            y,
            energy: START_ENERGY,
            score: 0,
            commits: 0,
            is_alive: true,
            color: color_for_id(id),
            last_action: now_millis(),
            joined_seq: seq,
        };
        let snapshot = PlayerSnapshot::from(&player);
        self.players.insert(player.id.clone(), player);
        snapshot
    }

    pub fn player_snapshot(&self, player_id: &str) -> Option<PlayerSnapshot> {
        self.players.get(player_id).map(PlayerSnapshot::from)
    }

    /// Applies a move request: clamps the target into the arena, coalesces
    /// sub-threshold displacements, charges the move cost, and resolves node
    /// captures at the new position.
    ///
    /// Returns `None` when the player does not exist in this session.
    pub fn apply_move(&mut self, player_id: &str, x: f32, y: f32) -> Option<MoveOutcome> {
        let player = self.players.get(player_id)?;
        if self.phase != Phase::Playing {
            // Late packets against a terminal session are dropped, not errors.
            return Some(MoveOutcome::Ignored(PlayerSnapshot::from(player)));
        }

        let (x, y) = self.bounds.clamp(x, y);
        let (dx, dy) = (x - player.x, y - player.y);
        if (dx * dx + dy * dy).sqrt() <= MOVE_THROTTLE_DISTANCE {
            return Some(MoveOutcome::Ignored(PlayerSnapshot::from(player)));
        }

        let effects = collision::resolve(x, y, &self.nodes);

        let player = self.players.get_mut(player_id)?;
        player.x = x;
        player.y = y;
        player.energy = (player.energy - MOVE_ENERGY_COST).max(0.0);
        player.last_action = now_millis();

        self.apply_effects(player_id, &effects);
        self.players
            .get(player_id)
            .map(|p| MoveOutcome::Applied(PlayerSnapshot::from(p)))
    }

    /// Shared commit accounting: fixed score reward, player commit counter,
    /// and the session-wide totals. Both the explicit commit action and a
    /// captured `Commit` node land here.
    ///
    /// Returns `None` when the player does not exist; a commit against a
    /// non-`Playing` session returns the untouched player state.
    pub fn record_commit(&mut self, player_id: &str) -> Option<CommitReceipt> {
        if self.phase != Phase::Playing {
            let player = self.players.get(player_id)?;
            return Some(CommitReceipt {
                player: PlayerSnapshot::from(player),
                total_commits: self.total_commits,
                world_energy: self.world_energy,
            });
        }

        let player = self.players.get_mut(player_id)?;
        player.commits += 1;
        player.score += COMMIT_SCORE;
        player.last_action = now_millis();
        let snapshot = PlayerSnapshot::from(&*player);

        self.total_commits += 1;
        self.world_energy += COMMIT_WORLD_ENERGY;
        Some(CommitReceipt {
            player: snapshot,
            total_commits: self.total_commits,
            world_energy: self.world_energy,
        })
    }

    /// Applies capture effects in order. Each node rewards at most once:
    /// captures deactivate the node, and already-inactive nodes are skipped.
    fn apply_effects(&mut self, player_id: &str, effects: &[CollisionEffect]) {
        for effect in effects {
            let Some(node) = self.nodes.get_mut(&effect.node_id) else {
                continue;
            };
            if !node.is_active {
                continue;
            }
            node.is_active = false;

            match effect.kind {
                NodeKind::Energy => {
                    if let Some(p) = self.players.get_mut(player_id) {
                        p.energy = (p.energy + effect.value as f32).min(MAX_ENERGY);
                    }
                }
                NodeKind::Commit => {
                    self.record_commit(player_id);
                }
                NodeKind::Powerup => {
                    if let Some(p) = self.players.get_mut(player_id) {
                        p.score += effect.value as u64;
                    }
                }
                NodeKind::Blockchain => {
                    if let Some(p) = self.players.get_mut(player_id) {
                        p.score += effect.value as u64;
                        p.commits += 1;
                    }
                }
            }

            tracing::info!(
                session_id = %self.id,
                player_id,
                node_id = %effect.node_id,
                kind = ?effect.kind,
                value = effect.value,
                "node captured"
            );
        }
    }

    /// Advances the countdown by one tick. Ends the game exactly once when
    /// the timer reaches zero.
    pub fn advance_tick(&mut self) -> TickOutcome {
        if self.phase != Phase::Playing {
            return TickOutcome::Idle;
        }

        self.tick += 1;
        self.time_left = self.time_left.saturating_sub(1);

        if self.time_left == 0 {
            let winner_id = self.resolve_winner();
            self.phase = Phase::Ended;
            self.winner_id = winner_id.clone();
            return TickOutcome::Ended { winner_id };
        }

        if self.tick % BROADCAST_EVERY_TICKS == 0 {
            TickOutcome::Broadcast
        } else {
            TickOutcome::Advanced
        }
    }

    /// Highest score wins; ties go to the earliest-joined player so the
    /// outcome does not depend on map iteration order.
    fn resolve_winner(&self) -> Option<String> {
        self.players
            .values()
            .max_by(|a, b| {
                a.score
                    .cmp(&b.score)
                    .then(b.joined_seq.cmp(&a.joined_seq))
            })
            .map(|p| p.id.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut players: Vec<PlayerSnapshot> = Vec::with_capacity(self.players.len());
        let mut by_seq: Vec<&Player> = self.players.values().collect();
        by_seq.sort_by_key(|p| p.joined_seq);
        for p in by_seq {
            players.push(PlayerSnapshot::from(p));
        }

        let mut nodes: Vec<NodeSnapshot> = self.nodes.values().map(NodeSnapshot::from).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        SessionSnapshot {
            session_id: self.id.clone(),
            phase: self.phase,
            tick: self.tick,
            time_left: self.time_left,
            world_energy: self.world_energy,
            total_commits: self.total_commits,
            winner_id: self.winner_id.clone(),
            players,
            nodes,
        }
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Stable id -> palette color mapping so every client renders a player the
/// same way without coordination.
pub fn color_for_id(id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let idx = (hasher.finish() % PLAYER_PALETTE.len() as u64) as usize;
    PLAYER_PALETTE[idx].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tuning;

    fn node(id: &str, x: f32, y: f32, kind: NodeKind, value: u32) -> Node {
        Node {
            id: id.to_string(),
            x,
            y,
            kind,
            value,
            radius: 20.0,
            is_active: true,
        }
    }

    fn playing_session(duration_secs: u64, nodes: Vec<Node>) -> Session {
        let mut session = Session::new(
            "session-test".to_string(),
            Duration::from_secs(duration_secs),
            nodes,
        );
        session.start();
        session
    }

    #[test]
    fn phase_only_moves_forward() {
        let mut session = Session::new("s".into(), Duration::from_secs(1), Vec::new());
        assert_eq!(session.phase, Phase::Waiting);
        session.start();
        assert_eq!(session.phase, Phase::Playing);
        session.add_player("p1", "One", 400.0, 300.0);
        assert_eq!(
            session.advance_tick(),
            TickOutcome::Ended {
                winner_id: Some("p1".to_string())
            }
        );
        assert_eq!(session.phase, Phase::Ended);
        // Starting again must not resurrect an ended session.
        session.start();
        assert_eq!(session.phase, Phase::Ended);
    }

    #[test]
    fn ended_session_ignores_moves_and_commits() {
        let mut session = playing_session(1, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);
        session.advance_tick();
        assert_eq!(session.phase, Phase::Ended);

        match session.apply_move("p1", 100.0, 100.0) {
            Some(MoveOutcome::Ignored(p)) => {
                assert_eq!(p.x, 400.0);
                assert_eq!(p.y, 300.0);
            }
            other => panic!("expected ignored move, got {other:?}"),
        }

        let receipt = session.record_commit("p1").unwrap();
        assert_eq!(receipt.player.commits, 0);
        assert_eq!(session.total_commits, 0);

        assert_eq!(session.advance_tick(), TickOutcome::Idle);
        assert_eq!(session.tick, 1);
    }

    #[test]
    fn move_clamps_into_arena_and_charges_energy() {
        let mut session = playing_session(60, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);

        match session.apply_move("p1", 10_000.0, -10_000.0).unwrap() {
            MoveOutcome::Applied(p) => {
                assert_eq!(p.x, 750.0);
                assert_eq!(p.y, 50.0);
                assert_eq!(p.energy, tuning::START_ENERGY - tuning::MOVE_ENERGY_COST);
            }
            other => panic!("expected applied move, got {other:?}"),
        }
    }

    #[test]
    fn sub_threshold_move_is_coalesced() {
        let mut session = playing_session(60, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);

        assert!(matches!(
            session.apply_move("p1", 430.0, 300.0).unwrap(),
            MoveOutcome::Applied(_)
        ));
        // 3 units of displacement is under the 5-unit threshold.
        match session.apply_move("p1", 433.0, 300.0).unwrap() {
            MoveOutcome::Ignored(p) => {
                assert_eq!(p.x, 430.0);
                assert_eq!(p.energy, tuning::START_ENERGY - tuning::MOVE_ENERGY_COST);
            }
            other => panic!("expected ignored move, got {other:?}"),
        }
    }

    #[test]
    fn energy_floors_at_zero() {
        let mut session = playing_session(600, Vec::new());
        session.add_player("p1", "One", 50.0, 50.0);
        if let Some(p) = session.players.get_mut("p1") {
            p.energy = 0.3;
        }

        session.apply_move("p1", 100.0, 100.0).unwrap();
        assert_eq!(session.players["p1"].energy, 0.0);
        session.apply_move("p1", 150.0, 150.0).unwrap();
        assert_eq!(session.players["p1"].energy, 0.0);
    }

    #[test]
    fn blockchain_node_grants_value_and_commit() {
        let mut session = playing_session(
            60,
            vec![node("node-1", 600.0, 300.0, NodeKind::Blockchain, 500)],
        );
        session.add_player("p1", "One", 400.0, 300.0);

        match session.apply_move("p1", 600.0, 300.0).unwrap() {
            MoveOutcome::Applied(p) => {
                assert_eq!(p.score, 500);
                assert_eq!(p.commits, 1);
            }
            other => panic!("expected applied move, got {other:?}"),
        }
        assert!(!session.nodes["node-1"].is_active);
        // Blockchain rewards are direct grants, not commit accounting.
        assert_eq!(session.total_commits, 0);
    }

    #[test]
    fn commit_node_reuses_commit_accounting() {
        let mut session =
            playing_session(60, vec![node("node-1", 600.0, 300.0, NodeKind::Commit, 180)]);
        session.add_player("p1", "One", 400.0, 300.0);

        session.apply_move("p1", 600.0, 300.0).unwrap();
        let p = &session.players["p1"];
        // The node's value is ignored; a commit node pays the fixed reward.
        assert_eq!(p.score, tuning::COMMIT_SCORE);
        assert_eq!(p.commits, 1);
        assert_eq!(session.total_commits, 1);
        assert_eq!(
            session.world_energy,
            tuning::WORLD_ENERGY_BASELINE + tuning::COMMIT_WORLD_ENERGY
        );
    }

    #[test]
    fn energy_node_clamps_at_cap() {
        let mut session =
            playing_session(60, vec![node("node-1", 600.0, 300.0, NodeKind::Energy, 250)]);
        session.add_player("p1", "One", 400.0, 300.0);

        session.apply_move("p1", 600.0, 300.0).unwrap();
        assert_eq!(session.players["p1"].energy, tuning::MAX_ENERGY);
    }

    #[test]
    fn captured_node_yields_nothing_to_later_players() {
        let mut session =
            playing_session(60, vec![node("node-1", 600.0, 300.0, NodeKind::Powerup, 200)]);
        session.add_player("p1", "One", 400.0, 300.0);
        session.add_player("p2", "Two", 200.0, 300.0);

        session.apply_move("p1", 600.0, 300.0).unwrap();
        assert_eq!(session.players["p1"].score, 200);

        session.apply_move("p2", 600.0, 300.0).unwrap();
        assert_eq!(session.players["p2"].score, 0);
        assert!(!session.nodes["node-1"].is_active);
    }

    #[test]
    fn double_commit_accounting() {
        let mut session = playing_session(60, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);

        session.record_commit("p1").unwrap();
        let receipt = session.record_commit("p1").unwrap();
        assert_eq!(receipt.player.commits, 2);
        assert_eq!(receipt.player.score, 2 * tuning::COMMIT_SCORE);
        assert_eq!(receipt.total_commits, 2);
        assert_eq!(
            receipt.world_energy,
            tuning::WORLD_ENERGY_BASELINE + 2 * tuning::COMMIT_WORLD_ENERGY
        );
    }

    #[test]
    fn timer_decrements_once_per_tick_and_ends_once() {
        let mut session = playing_session(3, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);

        assert_eq!(session.advance_tick(), TickOutcome::Advanced);
        assert_eq!(session.time_left, 2);
        assert_eq!(session.advance_tick(), TickOutcome::Advanced);
        assert_eq!(session.time_left, 1);
        assert!(matches!(session.advance_tick(), TickOutcome::Ended { .. }));
        assert_eq!(session.time_left, 0);
        assert_eq!(session.phase, Phase::Ended);
        // Further ticks are inert; no second end transition.
        assert_eq!(session.advance_tick(), TickOutcome::Idle);
        assert_eq!(session.time_left, 0);
    }

    #[test]
    fn periodic_broadcast_every_fifth_tick() {
        let mut session = playing_session(600, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);

        let mut broadcasts = 0;
        for _ in 0..10 {
            if session.advance_tick() == TickOutcome::Broadcast {
                broadcasts += 1;
            }
        }
        assert_eq!(broadcasts, 2);
    }

    #[test]
    fn winner_is_highest_score_with_join_order_tie_break() {
        let mut session = playing_session(1, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);
        session.add_player("p2", "Two", 200.0, 300.0);
        session.add_player("p3", "Three", 600.0, 300.0);
        if let Some(p) = session.players.get_mut("p2") {
            p.score = 300;
        }
        if let Some(p) = session.players.get_mut("p3") {
            p.score = 300;
        }

        match session.advance_tick() {
            TickOutcome::Ended { winner_id } => assert_eq!(winner_id.as_deref(), Some("p2")),
            other => panic!("expected ended, got {other:?}"),
        }
        assert_eq!(session.winner_id.as_deref(), Some("p2"));
    }

    #[test]
    fn rejoin_returns_existing_player() {
        let mut session = playing_session(60, Vec::new());
        session.add_player("p1", "One", 400.0, 300.0);
        session.record_commit("p1").unwrap();

        let rejoined = session.add_player("p1", "One Again", 100.0, 100.0);
        assert_eq!(rejoined.commits, 1);
        assert_eq!(rejoined.x, 400.0);
        assert_eq!(session.players.len(), 1);
    }

    #[test]
    fn color_assignment_is_stable() {
        assert_eq!(color_for_id("p1"), color_for_id("p1"));
        assert!(tuning::PLAYER_PALETTE.contains(&color_for_id("p1").as_str()));
    }
}
