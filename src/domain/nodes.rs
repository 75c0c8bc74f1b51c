// Node generation for fresh sessions.

use rand::Rng;

use crate::domain::session::{Node, NodeKind};
use crate::domain::tuning::{
    ArenaBounds, NODE_RADIUS_MAX, NODE_RADIUS_MIN, NODE_VALUE_MAX, NODE_VALUE_MIN,
};

const KINDS: [NodeKind; 4] = [
    NodeKind::Energy,
    NodeKind::Commit,
    NodeKind::Powerup,
    NodeKind::Blockchain,
];

/// Generates `count` collectible nodes with uniformly sampled interior
/// positions, kinds, reward values, and radii. Positions keep a margin of
/// the maximum node radius so no node overlaps the arena edge.
pub fn generate(count: usize, bounds: ArenaBounds, rng: &mut impl Rng) -> Vec<Node> {
    let margin = NODE_RADIUS_MAX;
    (0..count)
        .map(|i| Node {
            id: format!("node-{}", i + 1),
            x: rng.gen_range(bounds.min_x + margin..=bounds.max_x - margin),
            y: rng.gen_range(bounds.min_y + margin..=bounds.max_y - margin),
            kind: KINDS[rng.gen_range(0..KINDS.len())],
            value: rng.gen_range(NODE_VALUE_MIN..=NODE_VALUE_MAX),
            radius: rng.gen_range(NODE_RADIUS_MIN..=NODE_RADIUS_MAX),
            is_active: true,
        })
        .collect()
}

/// Uniformly samples an interior spawn point for a joining player.
pub fn spawn_point(bounds: ArenaBounds, rng: &mut impl Rng) -> (f32, f32) {
    (
        rng.gen_range(bounds.min_x..=bounds.max_x),
        rng.gen_range(bounds.min_y..=bounds.max_y),
    )
}
