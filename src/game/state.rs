//! Central container for one room's authoritative game data.

use std::collections::HashMap;

use crate::config::GameConfig;
use crate::game::entities::{Ball, BallId, BallType, Hoop, Player, PlayerId, Role, Team};
use crate::game::vec2::Vec2;

/// Ball id of the single volleyball.
pub const VOLLEYBALL_ID: &str = "volleyball";

/// Whether the volleyball is live or waiting on an inbound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundState {
    InPlay,
    /// Only `team` may pick the ball up until `timer` runs out.
    Inbounding { team: Team, timer: f32 },
}

/// Invariant violations detected after a tick. Any of these tears down the
/// offending room; other rooms keep running.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("entity {id} left the pitch at ({x:.2}, {y:.2})")]
    OutOfBounds { id: String, x: f32, y: f32 },

    #[error("ball {ball} held by unknown player {player}")]
    MissingHolder { ball: BallId, player: PlayerId },

    #[error("ball {ball} drifted away from holder {player}")]
    DetachedBall { ball: BallId, player: PlayerId },

    #[error("player {player} holds more than one ball")]
    DoubleHold { player: PlayerId },

    #[error("knocked-out player {player} is holding a ball or moving")]
    KnockedOutActive { player: PlayerId },
}

pub struct GameState {
    pub players: HashMap<PlayerId, Player>,
    /// Insertion order of players; drives the binary wire layout.
    pub player_order: Vec<PlayerId>,
    pub balls: HashMap<BallId, Ball>,
    pub ball_order: Vec<BallId>,
    pub hoops: Vec<Hoop>,
    pub score: [u32; 2],
    pub game_time: f32,
    /// Delay-of-game counter, 0..=delay_cap.
    pub delay_bin: u8,
    /// Fractional-second accumulator feeding `delay_bin`.
    pub delay_timer: f32,
    /// Team currently accumulating delay-of-game, if any.
    pub delay_team: Option<Team>,
    pub inbounding: InboundState,
}

impl GameState {
    /// Builds the field and roster for a fresh room, in kickoff formation.
    pub fn new(
        config: &GameConfig,
        roster: impl IntoIterator<Item = (PlayerId, String, Team, Role)>,
    ) -> Self {
        let mut state = Self {
            players: HashMap::new(),
            player_order: Vec::new(),
            balls: HashMap::new(),
            ball_order: Vec::new(),
            hoops: build_hoops(config),
            score: [0, 0],
            game_time: 0.0,
            delay_bin: 0,
            delay_timer: 0.0,
            delay_team: None,
            inbounding: InboundState::InPlay,
        };

        for (id, name, team, role) in roster {
            state.player_order.push(id);
            state
                .players
                .insert(id, Player::new(id, name, team, role, Vec2::ZERO));
        }

        let center = Vec2::new(config.pitch_length / 2.0, config.pitch_width / 2.0);
        for (ball_id, ball_type, position) in [
            (VOLLEYBALL_ID, BallType::Volleyball, center),
            (
                "dodgeball_0",
                BallType::Dodgeball,
                Vec2::new(config.keeper_zone_x, config.pitch_width / 4.0),
            ),
            (
                "dodgeball_1",
                BallType::Dodgeball,
                Vec2::new(
                    config.pitch_length - config.keeper_zone_x,
                    3.0 * config.pitch_width / 4.0,
                ),
            ),
        ] {
            state.ball_order.push(ball_id.to_string());
            state
                .balls
                .insert(ball_id.to_string(), Ball::new(ball_id, ball_type, position));
        }

        state.reset_for_kickoff(config);
        state
    }

    /// Arranges both teams and all balls for kickoff. Used at room start and
    /// after every goal; score and game clock are preserved.
    pub fn reset_for_kickoff(&mut self, config: &GameConfig) {
        let mut role_counts: HashMap<(Team, Role), usize> = HashMap::new();
        for id in self.player_order.clone() {
            let player = self.players.get_mut(&id).expect("ordered player exists");
            let nth = role_counts.entry((player.team, player.role)).or_insert(0);
            player.position = kickoff_position(config, player.team, player.role, *nth);
            *nth += 1;
            player.previous_position = player.position;
            player.velocity = Vec2::ZERO;
            player.desired_direction = Vec2::ZERO;
            player.is_knocked_out = false;
            player.knockout_timer = 0.0;
        }

        let center = Vec2::new(config.pitch_length / 2.0, config.pitch_width / 2.0);
        let dodgeball_spots = [
            Vec2::new(config.keeper_zone_x, config.pitch_width / 4.0),
            Vec2::new(
                config.pitch_length - config.keeper_zone_x,
                3.0 * config.pitch_width / 4.0,
            ),
        ];
        let mut dodgeball_idx = 0;
        for id in self.ball_order.clone() {
            let ball = self.balls.get_mut(&id).expect("ordered ball exists");
            ball.position = match ball.ball_type {
                BallType::Volleyball => center,
                BallType::Dodgeball => {
                    let spot = dodgeball_spots[dodgeball_idx % dodgeball_spots.len()];
                    dodgeball_idx += 1;
                    spot
                }
            };
            ball.previous_position = ball.position;
            ball.velocity = Vec2::ZERO;
            ball.holder_id = None;
            ball.is_dead = false;
            ball.last_thrower_id = None;
            ball.possession_team = None;
            ball.keeper_zone_touch_at = None;
        }

        self.delay_bin = 0;
        self.delay_timer = 0.0;
        self.delay_team = None;
        self.inbounding = InboundState::InPlay;
    }

    pub fn volleyball(&self) -> &Ball {
        &self.balls[VOLLEYBALL_ID]
    }

    pub fn volleyball_mut(&mut self) -> &mut Ball {
        self.balls.get_mut(VOLLEYBALL_ID).expect("volleyball exists")
    }

    /// The ball a player is holding, if any.
    pub fn held_ball_id(&self, player_id: PlayerId) -> Option<&BallId> {
        self.ball_order
            .iter()
            .find(|id| self.balls[*id].holder_id == Some(player_id))
    }

    pub fn has_ball(&self, player_id: PlayerId) -> bool {
        self.held_ball_id(player_id).is_some()
    }

    /// 0 = none, 1 = team 0, 2 = team 1; tracks the volleyball.
    pub fn possession_code(&self) -> u8 {
        match self.volleyball().possession_team {
            None => 0,
            Some(team) => team + 1,
        }
    }

    /// Pauses a disconnected player: knocked out without a recovery timer
    /// until the same player id reattaches. A held ball is released in place.
    pub fn pause_player(&mut self, config: &GameConfig, player_id: PlayerId) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.connected = false;
        player.is_knocked_out = true;
        player.knockout_timer = config.knockout_duration;
        let velocity = player.velocity;
        player.velocity = Vec2::ZERO;
        if let Some(ball_id) = self.held_ball_id(player_id).cloned() {
            let ball = self.balls.get_mut(&ball_id).expect("held ball exists");
            ball.holder_id = None;
            ball.velocity = velocity;
        }
    }

    /// Resumes a reconnected player immediately.
    pub fn resume_player(&mut self, player_id: PlayerId) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.connected = true;
            player.is_knocked_out = false;
            player.knockout_timer = 0.0;
        }
    }

    /// Re-attaches every held ball to its holder's position and velocity.
    pub fn sync_held_balls(&mut self) {
        for id in self.ball_order.clone() {
            let Some(holder_id) = self.balls[&id].holder_id else {
                continue;
            };
            let Some(holder) = self.players.get(&holder_id) else {
                continue;
            };
            let (position, velocity) = (holder.position, holder.velocity);
            let ball = self.balls.get_mut(&id).expect("ordered ball exists");
            ball.previous_position = ball.position;
            ball.position = position;
            ball.velocity = velocity;
        }
    }

    /// Verifies the structural invariants after a tick.
    pub fn check_invariants(&self, config: &GameConfig) -> Result<(), StateError> {
        let in_pitch = |p: Vec2| {
            p.x >= 0.0 && p.x <= config.pitch_length && p.y >= 0.0 && p.y <= config.pitch_width
        };

        for player in self.players.values() {
            if !in_pitch(player.position) {
                return Err(StateError::OutOfBounds {
                    id: player.id.to_string(),
                    x: player.position.x,
                    y: player.position.y,
                });
            }
            let held = self
                .ball_order
                .iter()
                .filter(|id| self.balls[*id].holder_id == Some(player.id))
                .count();
            if held > 1 {
                return Err(StateError::DoubleHold { player: player.id });
            }
            if player.is_knocked_out && (held > 0 || player.velocity.magnitude_squared() > 0.0) {
                return Err(StateError::KnockedOutActive { player: player.id });
            }
        }

        for ball in self.balls.values() {
            if !in_pitch(ball.position) {
                return Err(StateError::OutOfBounds {
                    id: ball.id.clone(),
                    x: ball.position.x,
                    y: ball.position.y,
                });
            }
            if let Some(holder_id) = ball.holder_id {
                let Some(holder) = self.players.get(&holder_id) else {
                    return Err(StateError::MissingHolder {
                        ball: ball.id.clone(),
                        player: holder_id,
                    });
                };
                if ball.position.distance_squared(holder.position) > 1e-6 {
                    return Err(StateError::DetachedBall {
                        ball: ball.id.clone(),
                        player: holder_id,
                    });
                }
            }
        }

        Ok(())
    }
}

fn build_hoops(config: &GameConfig) -> Vec<Hoop> {
    let mid_y = config.pitch_width / 2.0;
    let mut hoops = Vec::with_capacity(6);
    for team in [0u8, 1u8] {
        let x = config.from_own_goal(team, config.hoop_offset_x);
        for (suffix, dy) in [
            ("left", config.hoop_spacing),
            ("center", 0.0),
            ("right", -config.hoop_spacing),
        ] {
            hoops.push(Hoop {
                id: format!("hoop_{team}_{suffix}"),
                team,
                position: Vec2::new(x, mid_y + dy),
                radius: config.hoop_radius,
                thickness: config.hoop_thickness,
            });
        }
    }
    hoops
}

/// Kickoff slot for the nth player of a role on a team. Both teams mirror
/// around the midline: keeper on the hoop line, chasers in a triangle,
/// beaters flanking, seeker at the rear.
fn kickoff_position(config: &GameConfig, team: Team, role: Role, nth: usize) -> Vec2 {
    let mid_y = config.pitch_width / 2.0;
    let half = config.pitch_length / 2.0;
    let (distance, dy) = match role {
        Role::Keeper => (config.hoop_offset_x, nth as f32 * 1.5),
        Role::Chaser => match nth {
            0 => (half - 8.0, 0.0),
            1 => (half - 12.0, -6.0),
            2 => (half - 12.0, 6.0),
            n => (half - 14.0, (n as f32 - 2.0) * 2.0),
        },
        Role::Beater => match nth {
            0 => (config.keeper_zone_x + 2.0, -9.0),
            1 => (config.keeper_zone_x + 2.0, 9.0),
            n => (config.keeper_zone_x + 2.0, (n as f32 - 1.0) * 3.0),
        },
        Role::Seeker => (6.0, nth as f32 * 1.5),
    };
    Vec2::new(config.from_own_goal(team, distance), mid_y + dy)
}
