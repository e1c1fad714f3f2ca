//! End-to-end rule scenarios driven through `GameLogic::step`.

use std::sync::Arc;

use assert_approx_eq::assert_approx_eq;
use uuid::Uuid;

use quadball_server::config::GameConfig;
use quadball_server::game::encoder::{decode_state, encode_state};
use quadball_server::game::entities::{PlayerId, Role};
use quadball_server::game::state::{GameState, InboundState};
use quadball_server::game::vec2::Vec2;
use quadball_server::game::{GameEvent, GameLogic, TickInputs};

const DT: f32 = 0.05;

struct Fixture {
    config: Arc<GameConfig>,
    logic: GameLogic,
    state: GameState,
}

impl Fixture {
    /// Two full teams of four, kickoff formation, everyone connected.
    fn new() -> Self {
        let config = Arc::new(GameConfig::default());
        let roster: Vec<(PlayerId, String, u8, Role)> = [0u8, 1u8]
            .into_iter()
            .flat_map(|team| {
                [Role::Keeper, Role::Chaser, Role::Beater, Role::Seeker]
                    .into_iter()
                    .enumerate()
                    .map(move |(i, role)| {
                        (Uuid::new_v4(), format!("t{team}p{i}"), team, role)
                    })
            })
            .collect();
        let mut state = GameState::new(&config, roster);
        for id in state.player_order.clone() {
            state.resume_player(id);
        }
        let logic = GameLogic::new(config.clone());
        Self {
            config,
            logic,
            state,
        }
    }

    fn player(&self, team: u8, role: Role) -> PlayerId {
        *self
            .state
            .player_order
            .iter()
            .find(|id| {
                let p = &self.state.players[*id];
                p.team == team && p.role == role
            })
            .expect("roster has the role")
    }

    fn place(&mut self, id: PlayerId, position: Vec2) {
        let player = self.state.players.get_mut(&id).unwrap();
        player.position = position;
        player.previous_position = position;
    }

    fn give_volleyball(&mut self, id: PlayerId) {
        let position = self.state.players[&id].position;
        let team = self.state.players[&id].team;
        let vb = self.state.volleyball_mut();
        vb.holder_id = Some(id);
        vb.possession_team = Some(team);
        vb.position = position;
        vb.previous_position = position;
        self.state.sync_held_balls();
    }

    fn step(&mut self, inputs: &TickInputs) -> Vec<GameEvent> {
        let events = self.logic.step(&mut self.state, DT, inputs);
        self.state
            .check_invariants(&self.config)
            .expect("invariants hold after tick");
        events
    }

    fn step_idle(&mut self, ticks: usize) -> Vec<GameEvent> {
        let mut all = Vec::new();
        let idle = TickInputs::default();
        for _ in 0..ticks {
            all.extend(self.step(&idle));
        }
        all
    }
}

fn moves(pairs: &[(PlayerId, Vec2)]) -> TickInputs {
    let mut inputs = TickInputs::default();
    for (id, dir) in pairs {
        inputs.moves.insert(*id, *dir);
    }
    inputs
}

// Scenario 1: pick up at center, carry toward the opposing hoop, throw, score.
#[test]
fn kickoff_then_goal_resets_field() {
    let mut fx = Fixture::new();
    let chaser = fx.player(0, Role::Chaser);

    // Walk-on pickup at the center spot.
    fx.place(chaser, Vec2::new(30.0, 16.5));
    fx.step_idle(1);
    assert_eq!(fx.state.volleyball().holder_id, Some(chaser));
    assert_eq!(fx.state.possession_code(), 1);

    // Carry to shooting range of team 1's left hoop at (51, 19.25).
    fx.place(chaser, Vec2::new(46.0, 19.25));
    let mut inputs = moves(&[(chaser, Vec2::new(1.0, 0.0))]);
    inputs.throws.push(chaser);
    let events = fx.step(&inputs);
    assert!(events.is_empty());
    assert_eq!(fx.state.volleyball().holder_id, None);

    let mut scored = false;
    for _ in 0..20 {
        if fx
            .step_idle(1)
            .contains(&GameEvent::Goal { team: 0 })
        {
            scored = true;
            break;
        }
    }
    assert!(scored, "throw along +x should cross the hoop plane");
    assert_eq!(fx.state.score, [1, 0]);

    // Kickoff reset: ball at center, counters cleared, everyone upright.
    let vb = fx.state.volleyball();
    assert_eq!(vb.position, Vec2::new(30.0, 16.5));
    assert_eq!(vb.velocity, Vec2::ZERO);
    assert_eq!(vb.holder_id, None);
    assert_eq!(fx.state.delay_bin, 0);
    assert_eq!(fx.state.possession_code(), 0);
    assert!(fx.state.players.values().all(|p| !p.is_knocked_out));
}

// Scenario 2: a beat knocks the holder out and drops the volleyball with
// half the holder's velocity; possession stays with the holding team.
#[test]
fn knockout_drops_ball_at_half_velocity() {
    let mut fx = Fixture::new();
    let victim = fx.player(0, Role::Chaser);
    let beater = fx.player(1, Role::Beater);

    fx.place(victim, Vec2::new(30.0, 16.5));
    fx.give_volleyball(victim);
    fx.state.players.get_mut(&victim).unwrap().velocity = Vec2::new(2.0, 0.0);

    {
        let db = fx.state.balls.get_mut("dodgeball_0").unwrap();
        db.position = Vec2::new(29.7, 16.5);
        db.previous_position = db.position;
        db.velocity = Vec2::new(10.0, 0.0);
        db.last_thrower_id = Some(beater);
        db.possession_team = Some(1);
    }

    fx.step_idle(1);

    let victim_state = &fx.state.players[&victim];
    assert!(victim_state.is_knocked_out);
    assert_approx_eq!(victim_state.knockout_timer, 5.0, 1e-6);
    assert_eq!(victim_state.velocity, Vec2::ZERO);

    // Velocity at impact: one lerp step toward zero from (2, 0).
    let impact_velocity = 2.0 * (1.0 - 0.4);
    let vb = fx.state.volleyball();
    assert_eq!(vb.holder_id, None);
    assert_eq!(vb.position, victim_state.position);
    assert_approx_eq!(vb.velocity.x, impact_velocity * 0.5, 1e-4);
    assert_approx_eq!(vb.velocity.y, 0.0, 1e-6);
    // The holding team keeps possession through the knockout.
    assert_eq!(fx.state.possession_code(), 1);

    let db = &fx.state.balls["dodgeball_0"];
    assert!(db.is_dead);
    assert_eq!(db.velocity, Vec2::ZERO);
}

// Scenario 3: a keeper inside the own zone shrugs the beat off.
#[test]
fn keeper_in_own_zone_is_immune() {
    let mut fx = Fixture::new();
    let keeper = fx.player(0, Role::Keeper);
    let beater = fx.player(1, Role::Beater);

    fx.place(keeper, Vec2::new(5.0, 16.5));
    {
        let db = fx.state.balls.get_mut("dodgeball_0").unwrap();
        db.position = Vec2::new(4.6, 16.5);
        db.previous_position = db.position;
        db.velocity = Vec2::new(5.0, 0.0);
        db.last_thrower_id = Some(beater);
        db.possession_team = Some(1);
    }

    fx.step_idle(1);

    assert!(!fx.state.players[&keeper].is_knocked_out);
    let db = &fx.state.balls["dodgeball_0"];
    assert!(db.is_dead);
    assert_eq!(db.velocity, Vec2::ZERO);
}

// Scenario 4: stalling in the central band for eight seconds forces a
// turnover to the other team.
#[test]
fn delay_of_game_turnover_after_eight_seconds() {
    let mut fx = Fixture::new();
    let chaser = fx.player(0, Role::Chaser);
    fx.place(chaser, Vec2::new(30.0, 16.5));
    fx.give_volleyball(chaser);

    // One bin per full second of stalling; the turnover lands on the 8th.
    let mut turned_over = false;
    for _ in 0..170 {
        if fx.step_idle(1).contains(&GameEvent::Turnover { team: 1 }) {
            turned_over = true;
            break;
        }
    }
    assert!(turned_over, "stalling must force a turnover");
    assert!(fx.state.game_time >= 8.0 - 0.2);

    let vb = fx.state.volleyball();
    assert_eq!(vb.holder_id, None);
    assert_eq!(vb.velocity, Vec2::ZERO);
    assert_eq!(fx.state.possession_code(), 2);
    assert_eq!(fx.state.delay_bin, 0);
    assert!(!fx.state.has_ball(chaser));
}

// Scenario 5: side-line exit snaps the ball onto the line and locks pickups
// to the non-offending team for five seconds.
#[test]
fn inbounding_locks_pickup_to_the_other_team() {
    let mut fx = Fixture::new();
    let thrower = fx.player(0, Role::Chaser);
    {
        let vb = fx.state.volleyball_mut();
        vb.position = Vec2::new(30.0, 32.0);
        vb.previous_position = vb.position;
        vb.velocity = Vec2::new(0.0, 20.0);
        vb.last_thrower_id = Some(thrower);
        vb.possession_team = Some(0);
    }

    let events = fx.step_idle(1);
    assert!(events.contains(&GameEvent::InboundingStarted { team: 1 }));

    let vb = fx.state.volleyball();
    assert_eq!(vb.position, Vec2::new(30.0, 33.0));
    assert_eq!(vb.velocity, Vec2::ZERO);
    assert_eq!(fx.state.possession_code(), 2);
    assert!(matches!(
        fx.state.inbounding,
        InboundState::Inbounding { team: 1, .. }
    ));

    // The offending team stands right next to the ball and cannot touch it.
    fx.place(thrower, Vec2::new(30.0, 32.7));
    fx.step_idle(90);
    assert_eq!(fx.state.volleyball().holder_id, None);

    // After the lock expires the ball is free to anyone.
    fx.step_idle(15);
    assert_eq!(fx.state.volleyball().holder_id, Some(thrower));
    assert_eq!(fx.state.possession_code(), 1);
    assert_eq!(fx.state.inbounding, InboundState::InPlay);
}

// Scenario 6: the version-3 broadcast decodes to the server's state within
// half precision, and the possession-free v1 layout agrees on everything else.
#[test]
fn binary_versions_agree_on_kinematics() {
    let mut fx = Fixture::new();
    let chaser = fx.player(0, Role::Chaser);
    fx.place(chaser, Vec2::new(30.0, 16.5));
    fx.step_idle(1);
    fx.step(&moves(&[(chaser, Vec2::new(0.6, -0.8))]));
    fx.step_idle(3);

    let v3 = decode_state(&encode_state(3, &fx.state)).unwrap();
    let v1 = decode_state(&encode_state(1, &fx.state)).unwrap();

    assert_eq!(v3.version, 3);
    for (i, id) in fx.state.player_order.iter().enumerate() {
        let p = &fx.state.players[id];
        let d = &v3.players[i];
        let tolerance = |v: f32| v.abs().max(1.0) * 2f32.powi(-10);
        assert!((d.x - p.position.x).abs() <= tolerance(p.position.x));
        assert!((d.y - p.position.y).abs() <= tolerance(p.position.y));
        assert!((d.vx - p.velocity.x).abs() <= tolerance(p.velocity.x));
        assert!((d.vy - p.velocity.y).abs() <= tolerance(p.velocity.y));
        assert_eq!(d.has_ball, fx.state.has_ball(*id));
        assert_eq!(d.is_knocked_out, p.is_knocked_out);
    }

    // v1 carries no possession but identical kinematics and flags.
    for (a, b) in v1.players.iter().zip(&v3.players) {
        assert_eq!(a, b);
    }
    for (a, b) in v1.balls.iter().zip(&v3.balls) {
        assert_eq!((a.x, a.y, a.held, a.is_dead), (b.x, b.y, b.held, b.is_dead));
        assert_eq!(a.possession_code, 0);
    }
    assert_eq!(v3.balls[0].possession_code, fx.state.possession_code());
}

// Two throws from the same player in one tick release exactly once; a throw
// from a player holding nothing is dropped silently.
#[test]
fn duplicate_throws_release_once() {
    let mut fx = Fixture::new();
    let chaser = fx.player(0, Role::Chaser);
    let empty_handed = fx.player(1, Role::Chaser);
    fx.place(chaser, Vec2::new(30.0, 16.5));
    fx.give_volleyball(chaser);

    let mut inputs = TickInputs::default();
    inputs.throws.push(chaser);
    inputs.throws.push(chaser);
    inputs.throws.push(empty_handed);
    fx.step(&inputs);

    let vb = fx.state.volleyball();
    assert_eq!(vb.holder_id, None);
    assert_eq!(vb.last_thrower_id, Some(chaser));
    // A standing throw from team 0 leaves along +x at throw speed (one tick
    // of drag applied in flight).
    assert!(vb.velocity.x > 14.0);
    assert_approx_eq!(vb.velocity.y, 0.0, 1e-6);
    assert!(!fx.state.has_ball(chaser));
}

// A beater's touch revives a dead dodgeball and takes over the beat.
#[test]
fn dead_dodgeball_revived_by_beater() {
    let mut fx = Fixture::new();
    let beater = fx.player(0, Role::Beater);
    {
        let db = fx.state.balls.get_mut("dodgeball_0").unwrap();
        db.is_dead = true;
        db.velocity = Vec2::ZERO;
        db.position = Vec2::new(20.0, 10.0);
        db.previous_position = db.position;
        db.possession_team = None;
        db.last_thrower_id = None;
    }
    fx.place(beater, Vec2::new(20.2, 10.0));

    fx.step_idle(1);
    let db = &fx.state.balls["dodgeball_0"];
    assert!(!db.is_dead);
    assert_eq!(db.last_thrower_id, Some(beater));
    assert_eq!(db.possession_team, Some(0));

    // Now alive and slow, the beater picks it up on a later tick.
    fx.step_idle(2);
    assert_eq!(fx.state.balls["dodgeball_0"].holder_id, Some(beater));
}

// Invariants hold and the score is monotone over a busy stretch of play.
#[test]
fn invariants_hold_under_chaotic_play() {
    let mut fx = Fixture::new();
    let mut last_score = fx.state.score;
    let ids = fx.state.player_order.clone();

    for tick in 0..400 {
        // Everyone chases the volleyball; every 50th tick everyone throws.
        let ball_pos = fx.state.volleyball().position;
        let mut inputs = TickInputs::default();
        for id in &ids {
            let toward = (ball_pos - fx.state.players[id].position).normalize();
            inputs.moves.insert(*id, toward);
        }
        if tick % 50 == 49 {
            inputs.throws.extend(ids.iter().copied());
        }

        // step() asserts check_invariants internally.
        fx.step(&inputs);

        assert!(fx.state.score[0] >= last_score[0]);
        assert!(fx.state.score[1] >= last_score[1]);
        last_score = fx.state.score;
        assert!((fx.state.game_time - (tick + 1) as f32 * DT).abs() < 1e-2);
    }
}
