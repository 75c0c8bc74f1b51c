// Domain layer: core simulation types and rules.

pub mod collision;
pub mod nodes;
pub mod session;
pub mod tuning;

pub use session::{
    CommitReceipt, MoveOutcome, Node, NodeKind, NodeSnapshot, Phase, Player, PlayerSnapshot,
    Session, SessionSnapshot, TickOutcome,
};
