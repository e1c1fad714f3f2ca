//! Domain entities: players, balls and hoops.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::vec2::Vec2;

/// Room-unique player identifier.
pub type PlayerId = Uuid;

/// Ball identifier, stable per room (`volleyball`, `dodgeball_0`, ...).
pub type BallId = String;

/// Team index, 0 (attacks to +x) or 1 (attacks to -x).
pub type Team = u8;

pub fn other_team(team: Team) -> Team {
    1 - team
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Keeper,
    Chaser,
    Beater,
    Seeker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallType {
    /// The quaffle: one per game, scores through hoops.
    Volleyball,
    /// Bludgers: thrown by beaters to knock players out.
    Dodgeball,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub role: Role,
    pub position: Vec2,
    pub previous_position: Vec2,
    pub velocity: Vec2,
    /// Last movement intent, magnitude <= 1. Zero means coasting to a stop.
    pub desired_direction: Vec2,
    pub is_knocked_out: bool,
    /// Seconds until the knockout clears; only meaningful while knocked out.
    pub knockout_timer: f32,
    /// Disconnected players are paused (held in the knocked-out state) until
    /// a socket with the same player id reattaches.
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, team: Team, role: Role, position: Vec2) -> Self {
        Self {
            id,
            name,
            team,
            role,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            desired_direction: Vec2::ZERO,
            is_knocked_out: false,
            knockout_timer: 0.0,
            connected: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub id: BallId,
    pub ball_type: BallType,
    pub position: Vec2,
    pub previous_position: Vec2,
    pub velocity: Vec2,
    pub holder_id: Option<PlayerId>,
    /// Dodgeballs only: set after a beat, cleared when a beater revives it.
    pub is_dead: bool,
    pub last_thrower_id: Option<PlayerId>,
    /// Volleyball: team that last held or scored. Dodgeballs: beat ownership.
    pub possession_team: Option<Team>,
    /// Game-time stamp of the last keeper touch inside the keeper's own zone,
    /// used to void accidental goals off a keeper clearance.
    pub keeper_zone_touch_at: Option<f32>,
}

impl Ball {
    pub fn new(id: impl Into<BallId>, ball_type: BallType, position: Vec2) -> Self {
        Self {
            id: id.into(),
            ball_type,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            holder_id: None,
            is_dead: false,
            last_thrower_id: None,
            possession_team: None,
            keeper_zone_touch_at: None,
        }
    }
}

/// Goal hoop. Static for the lifetime of the room.
#[derive(Debug, Clone, Serialize)]
pub struct Hoop {
    pub id: String,
    pub team: Team,
    pub position: Vec2,
    pub radius: f32,
    pub thickness: f32,
}
