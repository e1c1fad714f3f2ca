//! Per-tick game rules.
//!
//! `GameLogic::step` applies the phases in a fixed order; every phase reads
//! the state produced by the one before it, which gives a total order over
//! all observable transitions within a tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::config::GameConfig;
use crate::game::entities::{other_team, BallId, BallType, Hoop, Player, PlayerId, Role, Team};
use crate::game::state::{GameState, InboundState};
use crate::game::vec2::Vec2;

/// Inputs drained from a room's queue for one tick. Movement intents are
/// coalesced upstream (latest wins per player); throws keep arrival order.
#[derive(Debug, Default)]
pub struct TickInputs {
    pub moves: HashMap<PlayerId, Vec2>,
    pub throws: Vec<PlayerId>,
}

/// Discrete rule outcomes worth an out-of-band JSON broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Goal { team: Team },
    Turnover { team: Team },
    InboundingStarted { team: Team },
}

pub struct GameLogic {
    config: Arc<GameConfig>,
}

impl GameLogic {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self { config }
    }

    /// Advances the simulation by one fixed timestep.
    pub fn step(&self, state: &mut GameState, dt: f32, inputs: &TickInputs) -> Vec<GameEvent> {
        let mut events = Vec::new();

        self.apply_inputs(state, inputs);
        self.integrate_players(state, dt);
        self.follow_holders(state);
        self.process_throws(state, inputs);
        self.integrate_free_balls(state, dt, &mut events);
        self.resolve_pickups(state);
        self.resolve_beats(state);
        let scored = self.detect_goals(state, &mut events);
        if !scored {
            self.resolve_player_collisions(state);
            self.update_delay_of_game(state, dt, &mut events);
        }
        self.advance_clock(state, dt);
        state.sync_held_balls();

        events
    }

    /// Phase A: latest movement intent becomes the desired direction.
    fn apply_inputs(&self, state: &mut GameState, inputs: &TickInputs) {
        for (player_id, direction) in &inputs.moves {
            let Some(player) = state.players.get_mut(player_id) else {
                continue;
            };
            if player.is_knocked_out {
                continue;
            }
            player.desired_direction = direction.clamped_norm();
        }
    }

    /// Phase B: velocity chases the target, knockouts tick down, positions
    /// integrate and clamp against the pitch walls (absorption, not bounce).
    fn integrate_players(&self, state: &mut GameState, dt: f32) {
        let cfg = &self.config;
        let blend = (cfg.accel_factor * dt).min(1.0);
        for id in state.player_order.clone() {
            let player = state.players.get_mut(&id).expect("ordered player exists");
            let target = player.desired_direction * cfg.max_speed(player.role);
            player.velocity = player.velocity.lerp(target, blend);

            if player.is_knocked_out {
                player.velocity = Vec2::ZERO;
                // Disconnected players stay paused until they reattach.
                if player.connected {
                    player.knockout_timer = (player.knockout_timer - dt).max(0.0);
                    if player.knockout_timer <= 0.0 {
                        player.is_knocked_out = false;
                    }
                }
            }

            player.previous_position = player.position;
            player.position += player.velocity * dt;
            clamp_to_pitch(
                cfg,
                cfg.player_radius,
                &mut player.position,
                &mut player.velocity,
            );
        }
    }

    /// Phase C: held balls ride along with their holders; keeper touches
    /// inside the own zone are stamped for the goal-void rule.
    fn follow_holders(&self, state: &mut GameState) {
        state.sync_held_balls();

        let cfg = &self.config;
        let now = state.game_time;
        let mut stamped: Vec<BallId> = Vec::new();
        for id in &state.ball_order {
            let ball = &state.balls[id];
            if ball.ball_type != BallType::Volleyball {
                continue;
            }
            let Some(holder) = ball.holder_id.and_then(|h| state.players.get(&h)) else {
                continue;
            };
            if holder.role == Role::Keeper && cfg.keeper_zone_contains(holder.team, holder.position)
            {
                stamped.push(id.clone());
            }
        }
        for id in stamped {
            state.balls.get_mut(&id).expect("stamped ball exists").keeper_zone_touch_at = Some(now);
        }
    }

    /// Phase D: buffered throws, in arrival order. A throw from a player who
    /// holds nothing (including the second of two same-tick throws) is
    /// silently dropped.
    fn process_throws(&self, state: &mut GameState, inputs: &TickInputs) {
        let cfg = &self.config;
        for &player_id in &inputs.throws {
            let Some(player) = state.players.get(&player_id) else {
                continue;
            };
            if player.is_knocked_out {
                continue;
            }
            let Some(ball_id) = state.held_ball_id(player_id).cloned() else {
                continue;
            };

            let (team, origin) = (player.team, player.position);
            let direction = if player.desired_direction.magnitude_squared() < 1e-12 {
                // A standing throw still has to leave the hand.
                Vec2::new(if team == 0 { 1.0 } else { -1.0 }, 0.0)
            } else {
                player.desired_direction.normalize()
            };

            let ball = state.balls.get_mut(&ball_id).expect("held ball exists");
            let radius = cfg.ball_radius(ball.ball_type);
            ball.holder_id = None;
            ball.velocity = direction * cfg.throw_speed(ball.ball_type);
            ball.position = origin + direction * (cfg.player_radius + radius + 0.01);
            ball.previous_position = ball.position;
            ball.last_thrower_id = Some(player_id);
            if ball.ball_type == BallType::Volleyball {
                ball.possession_team = Some(team);
                state.delay_bin = 0;
                state.delay_timer = 0.0;
                state.delay_team = None;
            }
            debug!(player = %player_id, ball = %ball_id, "throw released");
        }
    }

    /// Phase E: free-ball flight with drag, wall reflection, and side-line
    /// inbounding for the volleyball.
    fn integrate_free_balls(&self, state: &mut GameState, dt: f32, events: &mut Vec<GameEvent>) {
        let cfg = &self.config;
        let width = cfg.pitch_width;
        let mut volleyball_exited = false;

        for id in state.ball_order.clone() {
            let ball = state.balls.get_mut(&id).expect("ordered ball exists");
            if ball.holder_id.is_some() {
                continue;
            }
            let radius = cfg.ball_radius(ball.ball_type);

            ball.previous_position = ball.position;
            ball.position += ball.velocity * dt;
            ball.velocity = ball.velocity * (1.0 - cfg.ball_drag * dt).max(0.0);

            // Goal-end walls reflect for every ball type.
            if ball.position.x < radius {
                ball.position.x = radius;
                ball.velocity = ball.velocity.reflect(Vec2::new(1.0, 0.0), cfg.wall_restitution);
            } else if ball.position.x > cfg.pitch_length - radius {
                ball.position.x = cfg.pitch_length - radius;
                ball.velocity = ball.velocity.reflect(Vec2::new(-1.0, 0.0), cfg.wall_restitution);
            }

            match ball.ball_type {
                BallType::Dodgeball => {
                    if ball.position.y < radius {
                        ball.position.y = radius;
                        ball.velocity =
                            ball.velocity.reflect(Vec2::new(0.0, 1.0), cfg.wall_restitution);
                    } else if ball.position.y > width - radius {
                        ball.position.y = width - radius;
                        ball.velocity =
                            ball.velocity.reflect(Vec2::new(0.0, -1.0), cfg.wall_restitution);
                    }
                }
                BallType::Volleyball => {
                    let prev_y = ball.previous_position.y;
                    let exited_bottom = ball.position.y <= 0.0 && prev_y > 0.0;
                    let exited_top = ball.position.y >= width && prev_y < width;
                    if exited_bottom || exited_top || ball.position.y < 0.0 || ball.position.y > width
                    {
                        // Snap to the nearest on-line point and stop dead.
                        ball.position.y = ball.position.y.clamp(0.0, width);
                        ball.velocity = Vec2::ZERO;
                        volleyball_exited = true;
                    }
                }
            }
        }

        if volleyball_exited && state.inbounding == InboundState::InPlay {
            let vb = state.volleyball();
            let offending = vb.possession_team.or_else(|| {
                vb.last_thrower_id
                    .and_then(|id| state.players.get(&id))
                    .map(|p| p.team)
            });
            let team = other_team(offending.unwrap_or(1));
            state.volleyball_mut().possession_team = Some(team);
            state.inbounding = InboundState::Inbounding {
                team,
                timer: cfg.inbound_lock_secs,
            };
            state.delay_bin = 0;
            state.delay_timer = 0.0;
            state.delay_team = None;
            events.push(GameEvent::InboundingStarted { team });
            debug!(team, "volleyball out of bounds, inbounding");
        }
    }

    /// Phases F and K: pickups, with the goaltending suppression folded in.
    fn resolve_pickups(&self, state: &mut GameState) {
        let cfg = &self.config;
        let mut holding: HashSet<PlayerId> = state
            .balls
            .values()
            .filter_map(|b| b.holder_id)
            .collect();

        for ball_id in state.ball_order.clone() {
            let ball = &state.balls[&ball_id];
            if ball.holder_id.is_some() || ball.is_dead {
                continue;
            }
            let (ball_type, ball_pos) = (ball.ball_type, ball.position);
            let reach = cfg.player_radius + cfg.ball_radius(ball_type);

            // A thrown dodgeball still at speed beats instead of being caught.
            if ball_type == BallType::Dodgeball
                && ball.possession_team.is_some()
                && ball.velocity.magnitude() >= 0.1 * cfg.dodgeball_throw_speed
            {
                continue;
            }

            let mut picker: Option<(PlayerId, Team)> = None;
            for player_id in &state.player_order {
                let player = &state.players[player_id];
                if player.is_knocked_out || holding.contains(player_id) {
                    continue;
                }
                match ball_type {
                    BallType::Volleyball => {
                        if !matches!(player.role, Role::Keeper | Role::Chaser) {
                            continue;
                        }
                        if let InboundState::Inbounding { team, .. } = state.inbounding {
                            if player.team != team {
                                continue;
                            }
                        }
                        if player.role == Role::Chaser && self.is_goaltending(player) {
                            continue;
                        }
                    }
                    BallType::Dodgeball => {
                        if player.role != Role::Beater {
                            continue;
                        }
                    }
                }
                if player.position.distance_squared(ball_pos) <= reach * reach {
                    picker = Some((*player_id, player.team));
                    break;
                }
            }

            let Some((player_id, team)) = picker else {
                continue;
            };
            let ball = state.balls.get_mut(&ball_id).expect("ordered ball exists");
            ball.holder_id = Some(player_id);
            ball.possession_team = Some(team);
            holding.insert(player_id);
            if ball_type == BallType::Volleyball {
                state.delay_bin = 0;
                state.delay_timer = 0.0;
                state.delay_team = None;
                if matches!(state.inbounding, InboundState::Inbounding { team: t, .. } if t == team)
                {
                    state.inbounding = InboundState::InPlay;
                }
            }
            debug!(player = %player_id, ball = %ball_id, "picked up");
        }
    }

    /// Chasers may not camp their own hoops to block shots.
    fn is_goaltending(&self, player: &Player) -> bool {
        let cfg = &self.config;
        let radius_sq = cfg.goaltending_radius * cfg.goaltending_radius;
        self_hoops(player.team, cfg)
            .any(|hoop_pos| player.position.distance_squared(hoop_pos) <= radius_sq)
    }

    /// Phase G: dodgeball hits and dead-ball revival.
    fn resolve_beats(&self, state: &mut GameState) {
        let cfg = &self.config;
        for ball_id in state.ball_order.clone() {
            let ball = &state.balls[&ball_id];
            if ball.ball_type != BallType::Dodgeball {
                continue;
            }
            let reach = cfg.player_radius + cfg.dodgeball_radius;
            let ball_pos = ball.position;

            if ball.is_dead {
                // Any beater's touch revives the ball and owns the next beat.
                let reviver = state.player_order.iter().find(|id| {
                    let p = &state.players[*id];
                    p.role == Role::Beater
                        && !p.is_knocked_out
                        && p.position.distance_squared(ball_pos) <= reach * reach
                });
                if let Some(&reviver_id) = reviver {
                    let team = state.players[&reviver_id].team;
                    let ball = state.balls.get_mut(&ball_id).expect("ordered ball exists");
                    ball.is_dead = false;
                    ball.last_thrower_id = Some(reviver_id);
                    ball.possession_team = Some(team);
                    debug!(ball = %ball_id, beater = %reviver_id, "dodgeball revived");
                }
                continue;
            }

            if ball.holder_id.is_some() {
                continue;
            }
            let Some(thrower_id) = ball.last_thrower_id else {
                continue;
            };
            let Some(thrower_team) = state.players.get(&thrower_id).map(|p| p.team) else {
                continue;
            };

            let mut hit: Option<(PlayerId, bool)> = None;
            for player_id in &state.player_order {
                if *player_id == thrower_id {
                    continue;
                }
                let player = &state.players[player_id];
                if player.team == thrower_team || player.is_knocked_out {
                    continue;
                }
                if player.position.distance_squared(ball_pos) <= reach * reach {
                    let immune = player.role == Role::Keeper
                        && cfg.keeper_zone_contains(player.team, player.position);
                    hit = Some((*player_id, immune));
                    break;
                }
            }

            let Some((victim_id, immune)) = hit else {
                continue;
            };

            // The dodgeball dies on any contact, immune target or not.
            let ball = state.balls.get_mut(&ball_id).expect("ordered ball exists");
            ball.is_dead = true;
            ball.velocity = Vec2::ZERO;
            ball.possession_team = None;

            if immune {
                debug!(player = %victim_id, "beat absorbed by keeper immunity");
                continue;
            }

            let victim = state.players.get_mut(&victim_id).expect("victim exists");
            victim.is_knocked_out = true;
            victim.knockout_timer = cfg.knockout_duration;
            let victim_velocity = victim.velocity;
            let victim_position = victim.position;
            victim.velocity = Vec2::ZERO;
            debug!(player = %victim_id, "knocked out by dodgeball");

            if let Some(dropped_id) = state.held_ball_id(victim_id).cloned() {
                let dropped = state.balls.get_mut(&dropped_id).expect("held ball exists");
                dropped.holder_id = None;
                dropped.position = victim_position;
                dropped.previous_position = victim_position;
                // A dropped volleyball carries half the victim's momentum;
                // the holding team keeps possession.
                dropped.velocity = match dropped.ball_type {
                    BallType::Volleyball => victim_velocity * 0.5,
                    BallType::Dodgeball => victim_velocity,
                };
            }
        }
    }

    /// Phase H: goal detection. Returns true if a goal reset the field.
    fn detect_goals(&self, state: &mut GameState, events: &mut Vec<GameEvent>) -> bool {
        let cfg = &self.config;
        let vb = state.volleyball();
        if vb.holder_id.is_some() {
            return false;
        }
        let Some(scoring_team) = vb.possession_team else {
            return false;
        };
        if let Some(touched_at) = vb.keeper_zone_touch_at {
            // Keeper clearances from the own zone cannot score for a beat.
            if state.game_time - touched_at < cfg.keeper_clearance_window {
                return false;
            }
        }

        let prev = vb.previous_position;
        let cur = vb.position;
        let crossed = state
            .hoops
            .iter()
            .find(|hoop| hoop.team != scoring_team && segment_crosses_hoop(prev, cur, hoop));
        let Some(hoop) = crossed else {
            return false;
        };

        debug!(team = scoring_team, hoop = %hoop.id, "goal scored");
        state.score[scoring_team as usize] += 1;
        events.push(GameEvent::Goal { team: scoring_team });
        let config = self.config.clone();
        state.reset_for_kickoff(&config);
        true
    }

    /// Phase I: pairwise player collisions. Active players separate and
    /// exchange the normal velocity component; knocked-out players act as
    /// static obstacles.
    fn resolve_player_collisions(&self, state: &mut GameState) {
        let cfg = &self.config;
        let min_d = 2.0 * cfg.player_radius;

        let order = state.player_order.clone();
        let mut bodies: Vec<(Vec2, Vec2, bool)> = order
            .iter()
            .map(|id| {
                let p = &state.players[id];
                (p.position, p.velocity, p.is_knocked_out)
            })
            .collect();

        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let (pi, vi, ki) = bodies[i];
                let (pj, vj, kj) = bodies[j];
                if ki && kj {
                    continue;
                }
                let d_sq = pi.distance_squared(pj);
                if d_sq >= min_d * min_d || d_sq < 1e-12 {
                    continue;
                }
                let d = d_sq.sqrt();
                let normal = (pj - pi) * (1.0 / d);
                let overlap = min_d - d;

                if !ki && !kj {
                    let vi_n = vi.dot(normal);
                    let vj_n = vj.dot(normal);
                    bodies[i].0 = pi - normal * (overlap / 2.0);
                    bodies[j].0 = pj + normal * (overlap / 2.0);
                    bodies[i].1 = vi + normal * (vj_n - vi_n);
                    bodies[j].1 = vj + normal * (vi_n - vj_n);
                } else if ki {
                    // i is a static obstacle; j backs off and loses its
                    // approach component.
                    bodies[j].0 = pj + normal * overlap;
                    let vj_n = vj.dot(normal);
                    if vj_n < 0.0 {
                        bodies[j].1 = vj - normal * vj_n;
                    }
                } else {
                    bodies[i].0 = pi - normal * overlap;
                    let vi_n = vi.dot(normal);
                    if vi_n > 0.0 {
                        bodies[i].1 = vi - normal * vi_n;
                    }
                }
            }
        }

        for (id, (mut position, mut velocity, knocked)) in order.iter().zip(bodies) {
            if knocked {
                continue;
            }
            clamp_to_pitch(cfg, cfg.player_radius, &mut position, &mut velocity);
            let player = state.players.get_mut(id).expect("ordered player exists");
            player.position = position;
            player.velocity = velocity;
        }
    }

    /// Phase J: delay-of-game accounting and the forced turnover at the cap.
    fn update_delay_of_game(&self, state: &mut GameState, dt: f32, events: &mut Vec<GameEvent>) {
        let cfg = &self.config;
        let mid = cfg.midline_x();
        let vb = state.volleyball();
        if (vb.previous_position.x - mid) * (vb.position.x - mid) < 0.0 {
            // Crossing the half-line restarts the count.
            state.delay_bin = 0;
            state.delay_timer = 0.0;
        }

        let vb = state.volleyball();
        let in_band = cfg.central_band_contains(vb.position.x);
        let holder_team = vb
            .holder_id
            .and_then(|id| state.players.get(&id))
            .map(|p| p.team);

        match holder_team {
            Some(team) if in_band => {
                if state.delay_team == Some(team) {
                    state.delay_timer += dt;
                    while state.delay_timer >= 1.0 && state.delay_bin < cfg.delay_cap {
                        state.delay_timer -= 1.0;
                        state.delay_bin += 1;
                    }
                } else {
                    state.delay_team = Some(team);
                    state.delay_timer = dt;
                }

                if state.delay_bin >= cfg.delay_cap {
                    let new_team = other_team(team);
                    let vb = state.volleyball_mut();
                    vb.holder_id = None;
                    vb.velocity = Vec2::ZERO;
                    vb.possession_team = Some(new_team);
                    state.delay_bin = 0;
                    state.delay_timer = 0.0;
                    state.delay_team = None;
                    events.push(GameEvent::Turnover { team: new_team });
                    debug!(team = new_team, "delay of game turnover");
                }
            }
            _ => {
                state.delay_team = None;
                state.delay_timer = 0.0;
            }
        }
    }

    /// Phase L: the game clock and the inbounding lock timer.
    fn advance_clock(&self, state: &mut GameState, dt: f32) {
        state.game_time += dt;
        if let InboundState::Inbounding { team, timer } = state.inbounding {
            let remaining = timer - dt;
            state.inbounding = if remaining <= 0.0 {
                // Lock expired: the ball is free to anyone.
                InboundState::InPlay
            } else {
                InboundState::Inbounding {
                    team,
                    timer: remaining,
                }
            };
        }
    }
}

/// Positions of a team's own hoops.
fn self_hoops(team: Team, cfg: &GameConfig) -> impl Iterator<Item = Vec2> + '_ {
    let x = cfg.from_own_goal(team, cfg.hoop_offset_x);
    let mid_y = cfg.pitch_width / 2.0;
    [-cfg.hoop_spacing, 0.0, cfg.hoop_spacing]
        .into_iter()
        .map(move |dy| Vec2::new(x, mid_y + dy))
}

/// Clamps a circle to the pitch rectangle, absorbing velocity on contact.
fn clamp_to_pitch(cfg: &GameConfig, radius: f32, position: &mut Vec2, velocity: &mut Vec2) {
    let max_x = cfg.pitch_length - radius;
    let max_y = cfg.pitch_width - radius;
    if position.x < radius || position.x > max_x {
        position.x = position.x.clamp(radius, max_x);
        velocity.x = 0.0;
    }
    if position.y < radius || position.y > max_y {
        position.y = position.y.clamp(radius, max_y);
        velocity.y = 0.0;
    }
}

/// True if the segment from `prev` to `cur` passes through the hoop's plane
/// within the ring opening. The thickness widens the vertical tolerance.
fn segment_crosses_hoop(prev: Vec2, cur: Vec2, hoop: &Hoop) -> bool {
    let dx = cur.x - prev.x;
    if dx.abs() < 1e-9 {
        return false;
    }
    let t = (hoop.position.x - prev.x) / dx;
    if !(0.0..=1.0).contains(&t) {
        return false;
    }
    let y = prev.y + t * (cur.y - prev.y);
    (y - hoop.position.y).abs() <= hoop.radius + hoop.thickness / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hoop_crossing_requires_plane_and_opening() {
        let hoop = Hoop {
            id: "hoop_1_center".into(),
            team: 1,
            position: Vec2::new(51.0, 16.5),
            radius: 0.43,
            thickness: 0.1,
        };
        // Straight through the middle.
        assert!(segment_crosses_hoop(
            Vec2::new(50.5, 16.5),
            Vec2::new(51.5, 16.5),
            &hoop
        ));
        // Crosses the plane but outside the ring.
        assert!(!segment_crosses_hoop(
            Vec2::new(50.5, 18.0),
            Vec2::new(51.5, 18.0),
            &hoop
        ));
        // Never reaches the plane.
        assert!(!segment_crosses_hoop(
            Vec2::new(49.0, 16.5),
            Vec2::new(50.0, 16.5),
            &hoop
        ));
        // Wrong direction does not matter; any crossing counts.
        assert!(segment_crosses_hoop(
            Vec2::new(51.5, 16.4),
            Vec2::new(50.5, 16.6),
            &hoop
        ));
    }

    #[test]
    fn clamp_absorbs_only_blocked_components() {
        let cfg = GameConfig::default();
        let mut pos = Vec2::new(-1.0, 10.0);
        let mut vel = Vec2::new(-3.0, 2.0);
        clamp_to_pitch(&cfg, 0.3, &mut pos, &mut vel);
        assert_eq!(pos, Vec2::new(0.3, 10.0));
        assert_eq!(vel, Vec2::new(0.0, 2.0));
    }
}
