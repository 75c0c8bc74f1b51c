// Wire protocol DTOs and conversions for public session server messages.

use serde::{Deserialize, Serialize};

use crate::domain::{NodeKind, NodeSnapshot, Phase, PlayerSnapshot, SessionSnapshot};
use crate::use_cases::SessionEvent;

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity for the connection after Join is accepted.
    Identity { player_id: String },
    // A move was applied to some player in the session.
    Moved {
        player_id: String,
        x: f32,
        y: f32,
        energy: f32,
    },
    // A commit was recorded for some player in the session.
    Committed {
        player_id: String,
        commits: u64,
        score: u64,
    },
    // Periodic full snapshot of the session.
    StateUpdate(SessionSnapshotDto),
    // Terminal snapshot carrying the winner and final scores.
    Ended(SessionSnapshotDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message identifying the player.
    Join(JoinPayload),
    // Movement request sent after a successful Join.
    Move(MovePayload),
    // Explicit commit action.
    Commit,
}

/// Payload for the Join handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
}

/// Target position for a move request.
#[derive(Debug, Clone, Deserialize)]
pub struct MovePayload {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// Session lifecycle phase on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhaseDto {
    Waiting,
    Playing,
    Ended,
}

impl From<Phase> for PhaseDto {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Waiting => PhaseDto::Waiting,
            Phase::Playing => PhaseDto::Playing,
            Phase::Ended => PhaseDto::Ended,
        }
    }
}

/// Node reward kind on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKindDto {
    Energy,
    Commit,
    Powerup,
    Blockchain,
}

impl From<NodeKind> for NodeKindDto {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Energy => NodeKindDto::Energy,
            NodeKind::Commit => NodeKindDto::Commit,
            NodeKind::Powerup => NodeKindDto::Powerup,
            NodeKind::Blockchain => NodeKindDto::Blockchain,
        }
    }
}

/// Flattened player state for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerDto {
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

impl From<&PlayerSnapshot> for PlayerDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            x: player.x,
            y: player.y,
            energy: player.energy,
            score: player.score,
            commits: player.commits,
            is_alive: player.is_alive,
            color: player.color.clone(),
            last_action: player.last_action,
        }
    }
}

/// Flattened node state for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub kind: NodeKindDto,
    pub value: u32,
    pub radius: f32,
    pub is_active: bool,
}

impl From<&NodeSnapshot> for NodeDto {
    fn from(node: &NodeSnapshot) -> Self {
        Self {
            id: node.id.clone(),
            x: node.x,
            y: node.y,
            kind: node.kind.into(),
            value: node.value,
            radius: node.radius,
            is_active: node.is_active,
        }
    }
}

/// Full session snapshot sent to clients on joins, periodic broadcasts, and
/// game end.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshotDto {
    pub session_id: String,
    pub phase: PhaseDto,
    pub tick: u64,
    pub time_left: u32,
    pub world_energy: u32,
    pub total_commits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    pub players: Vec<PlayerDto>,
    pub nodes: Vec<NodeDto>,
}

impl From<&SessionSnapshot> for SessionSnapshotDto {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id.clone(),
            phase: snapshot.phase.into(),
            tick: snapshot.tick,
            time_left: snapshot.time_left,
            world_energy: snapshot.world_energy,
            total_commits: snapshot.total_commits,
            winner_id: snapshot.winner_id.clone(),
            players: snapshot.players.iter().map(PlayerDto::from).collect(),
            nodes: snapshot.nodes.iter().map(NodeDto::from).collect(),
        }
    }
}

impl From<SessionEvent> for ServerMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Moved {
                player_id,
                x,
                y,
                energy,
            } => ServerMessage::Moved {
                player_id,
                x,
                y,
                energy,
            },
            SessionEvent::Committed {
                player_id,
                commits,
                score,
            } => ServerMessage::Committed {
                player_id,
                commits,
                score,
            },
            SessionEvent::StateUpdate(snapshot) => {
                ServerMessage::StateUpdate(SessionSnapshotDto::from(&snapshot))
            }
            SessionEvent::Ended(snapshot) => {
                ServerMessage::Ended(SessionSnapshotDto::from(&snapshot))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse() {
        let join: ClientMessage = serde_json::from_str(
            r#"{"type":"Join","data":{"player_id":"p1","player_name":"One"}}"#,
        )
        .unwrap();
        assert!(matches!(join, ClientMessage::Join(_)));

        let mv: ClientMessage =
            serde_json::from_str(r#"{"type":"Move","data":{"x":120.5,"y":340.0}}"#).unwrap();
        match mv {
            ClientMessage::Move(payload) => {
                assert_eq!(payload.x, 120.5);
                assert_eq!(payload.y, 340.0);
            }
            other => panic!("expected move, got {other:?}"),
        }

        let commit: ClientMessage = serde_json::from_str(r#"{"type":"Commit"}"#).unwrap();
        assert!(matches!(commit, ClientMessage::Commit));
    }

    #[test]
    fn server_messages_tag_type_and_data() {
        let msg = ServerMessage::Moved {
            player_id: "p1".to_string(),
            x: 100.0,
            y: 200.0,
            energy: 99.5,
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "Moved");
        assert_eq!(value["data"]["player_id"], "p1");
        assert_eq!(value["data"]["energy"], 99.5);
    }

    #[test]
    fn node_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NodeKindDto::Blockchain).unwrap(),
            r#""blockchain""#
        );
        assert_eq!(serde_json::to_string(&PhaseDto::Playing).unwrap(), r#""playing""#);
    }
}
