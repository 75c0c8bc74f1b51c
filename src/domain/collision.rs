// Capture detection between a moved player and the session's node set.
// Pure inspection only; reward application lives on `Session` so all state
// mutation stays behind one door.

use std::collections::HashMap;

use crate::domain::session::{Node, NodeKind};
use crate::domain::tuning::PLAYER_RADIUS;

/// One captured node and the reward it carries.
#[derive(Debug, Clone)]
pub struct CollisionEffect {
    pub node_id: String,
    pub kind: NodeKind,
    pub value: u32,
}

/// Returns the effects for every active node within capture range of the
/// player's new position. Multiple nodes can be captured by a single move;
/// order between them is unspecified and each applies independently.
pub fn resolve(x: f32, y: f32, nodes: &HashMap<String, Node>) -> Vec<CollisionEffect> {
    let mut effects = Vec::new();
    for node in nodes.values() {
        if !node.is_active {
            continue;
        }

        let hit_radius = node.radius + PLAYER_RADIUS;
        let hit_radius_sq = hit_radius * hit_radius;
        let dx = node.x - x;
        let dy = node.y - y;
        if (dx * dx + dy * dy) < hit_radius_sq {
            effects.push(CollisionEffect {
                node_id: node.id.clone(),
                kind: node.kind,
                value: node.value,
            });
        }
    }
    effects
}
