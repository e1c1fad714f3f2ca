//! WebSocket protocol message definitions.
//! These are the wire types for lobby and game communication.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::game::entities::{BallType, PlayerId, Role, Team};
use crate::game::state::GameState;
use crate::game::vec2::Vec2;

/// Roster entry shown in lobby listings and carried into the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub role: Role,
}

/// Lobby listing row for rooms still accepting players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub creator_name: String,
    pub players_count: usize,
    pub max_players: usize,
}

/// Messages sent from lobby clients to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyClientMsg {
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        room_id: String,
        player_name: String,
    },
    ListRooms,
    UpdatePlayer {
        room_id: String,
        player_id: PlayerId,
        team: Option<Team>,
        role: Option<Role>,
    },
    StartGame {
        room_id: String,
    },
}

/// Messages sent from the server to lobby clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyServerMsg {
    RoomCreated {
        room_id: String,
        player_id: PlayerId,
        players: Vec<RosterEntry>,
    },
    JoinSuccessful {
        room_id: String,
        player_id: PlayerId,
        players: Vec<RosterEntry>,
    },
    JoinFailed {
        error: String,
    },
    RoomsList {
        rooms: Vec<RoomSummary>,
    },
    PlayersUpdated {
        players: Vec<RosterEntry>,
    },
    UpdateFailed {
        error: String,
    },
    StartFailed {
        error: String,
    },
    /// Sent to every lobby peer of the room; player_id is the recipient's.
    StartSuccessful {
        room_id: String,
        player_id: Option<PlayerId>,
    },
}

/// JSON frames a game client can send. Movement intents travel as 4-byte
/// binary frames instead (two little-endian half floats).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameClientMsg {
    Throw,
}

/// JSON frames sent on the game socket. Regular state rides the binary
/// format; these carry the initial snapshot and discrete events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameServerMsg {
    InitialState {
        game_state: GameStateView,
        players_order: Vec<PlayerId>,
        balls_order: Vec<String>,
        config: ConfigView,
    },
    StateUpdate {
        game_state: GameStateView,
        delay_bin: u8,
        possession_code: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub role: Role,
    pub position: Vec2,
    pub velocity: Vec2,
    pub is_knocked_out: bool,
    pub has_ball: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallView {
    pub id: String,
    pub ball_type: BallType,
    pub position: Vec2,
    pub velocity: Vec2,
    pub holder_id: Option<PlayerId>,
    pub is_dead: bool,
    pub possession_team: Option<Team>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoopView {
    pub id: String,
    pub team: Team,
    pub position: Vec2,
    pub radius: f32,
    pub thickness: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateView {
    pub players: Vec<PlayerView>,
    pub balls: Vec<BallView>,
    pub hoops: Vec<HoopView>,
    pub score: [u32; 2],
    pub game_time: f32,
}

impl GameStateView {
    pub fn from_state(state: &GameState) -> Self {
        let players = state
            .player_order
            .iter()
            .map(|id| {
                let p = &state.players[id];
                PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    team: p.team,
                    role: p.role,
                    position: p.position,
                    velocity: p.velocity,
                    is_knocked_out: p.is_knocked_out,
                    has_ball: state.has_ball(p.id),
                }
            })
            .collect();
        let balls = state
            .ball_order
            .iter()
            .map(|id| {
                let b = &state.balls[id];
                BallView {
                    id: b.id.clone(),
                    ball_type: b.ball_type,
                    position: b.position,
                    velocity: b.velocity,
                    holder_id: b.holder_id,
                    is_dead: b.is_dead,
                    possession_team: b.possession_team,
                }
            })
            .collect();
        let hoops = state
            .hoops
            .iter()
            .map(|h| HoopView {
                id: h.id.clone(),
                team: h.team,
                position: h.position,
                radius: h.radius,
                thickness: h.thickness,
            })
            .collect();
        Self {
            players,
            balls,
            hoops,
            score: state.score,
            game_time: state.game_time,
        }
    }
}

/// Subset of the server config clients need to render to scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigView {
    pub pitch_length: f32,
    pub pitch_width: f32,
    pub keeper_zone_x: f32,
    pub hoop_radius: f32,
    pub hoop_thickness: f32,
    pub player_radius: f32,
    pub volleyball_radius: f32,
    pub dodgeball_radius: f32,
    pub tick_hz: u32,
}

impl ConfigView {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            pitch_length: config.pitch_length,
            pitch_width: config.pitch_width,
            keeper_zone_x: config.keeper_zone_x,
            hoop_radius: config.hoop_radius,
            hoop_thickness: config.hoop_thickness,
            player_radius: config.player_radius,
            volleyball_radius: config.volleyball_radius,
            dodgeball_radius: config.dodgeball_radius,
            tick_hz: config.tick_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_messages_use_snake_case_tags() {
        let msg: LobbyClientMsg =
            serde_json::from_str(r#"{"type":"create_room","player_name":"ada"}"#).unwrap();
        assert!(
            matches!(msg, LobbyClientMsg::CreateRoom { ref player_name } if player_name == "ada")
        );

        let out = serde_json::to_value(LobbyServerMsg::JoinFailed {
            error: "Room not found".into(),
        })
        .unwrap();
        assert_eq!(out["type"], "join_failed");
        assert_eq!(out["error"], "Room not found");
    }

    #[test]
    fn throw_frame_parses() {
        let msg: GameClientMsg = serde_json::from_str(r#"{"type":"throw"}"#).unwrap();
        assert!(matches!(msg, GameClientMsg::Throw));
    }

    #[test]
    fn update_player_fields_are_optional() {
        let msg: LobbyClientMsg = serde_json::from_str(
            r#"{"type":"update_player","room_id":"ab12cd","player_id":"4be0643f-1d98-573b-97cd-ca98a65347dd","team":1}"#,
        )
        .unwrap();
        match msg {
            LobbyClientMsg::UpdatePlayer { team, role, .. } => {
                assert_eq!(team, Some(1));
                assert_eq!(role, None);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
