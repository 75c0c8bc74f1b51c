/// Gameplay tuning for the arena and its rewards.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

/// Playable rectangle players and nodes live in, in pixels.
#[derive(Debug, Clone, Copy)]
pub struct ArenaBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl ArenaBounds {
    /// Clamps a point into the arena rectangle.
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(self.min_x, self.max_x),
            y.clamp(self.min_y, self.max_y),
        )
    }

    /// Arena center, the owner's spawn point.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

impl Default for ArenaBounds {
    fn default() -> Self {
        Self {
            min_x: 50.0,
            max_x: 750.0,
            min_y: 50.0,
            max_y: 550.0,
        }
    }
}

/// World-space collision radius for players, in pixels.
pub const PLAYER_RADIUS: f32 = 25.0;

/// Energy spent per applied move.
pub const MOVE_ENERGY_COST: f32 = 0.5;

/// Minimum Euclidean displacement before a move is applied.
///
/// Moves under this distance are coalesced away to bound event volume; this
/// is a throttling policy, not a correctness requirement.
pub const MOVE_THROTTLE_DISTANCE: f32 = 5.0;

/// Upper bound on player energy.
pub const MAX_ENERGY: f32 = 100.0;

/// Energy a freshly spawned player starts with.
pub const START_ENERGY: f32 = 100.0;

/// Score granted per commit (explicit action or commit-node capture).
pub const COMMIT_SCORE: u64 = 100;

/// World energy added to the session per commit.
pub const COMMIT_WORLD_ENERGY: u32 = 50;

/// World energy a session starts with.
pub const WORLD_ENERGY_BASELINE: u32 = 1000;

/// Collectible nodes generated for a fresh session.
pub const SESSION_NODE_COUNT: usize = 5;

/// Inclusive reward-value range for generated nodes.
pub const NODE_VALUE_MIN: u32 = 50;
pub const NODE_VALUE_MAX: u32 = 250;

/// Inclusive radius range for generated nodes, in pixels. The generator
/// keeps node centers at least `NODE_RADIUS_MAX` away from the arena edge.
pub const NODE_RADIUS_MIN: f32 = 15.0;
pub const NODE_RADIUS_MAX: f32 = 25.0;

/// Fixed palette players are colored from by hashing their id, so the same
/// id always renders the same color on every client.
pub const PLAYER_PALETTE: [&str; 8] = [
    "#58a6ff", "#f85149", "#3fb950", "#bc8cff", "#d29922", "#39c5cf", "#db61a2", "#e3b341",
];
