//! Compact binary state packets.
//!
//! Little-endian layout, versions 1..=3. The server broadcasts version 3;
//! the decoder understands all three because deployed clients do.
//!
//! ```text
//! u8 version | u8 player_count | u8 ball_count | f16 game_time | u8 score0 | u8 score1
//! per player: f16 x | f16 y | f16 vx | f16 vy | u8 flags (bit0 knocked_out, bit1 has_ball)
//! per ball:   f16 x | f16 y | f16 vx | f16 vy | u8 holder_flag | u8 is_dead
//!             | u8 possession_code            (version 3 only)
//! trailer:    u8 delay_bin | u8 possession_code  (version 2 only)
//! ```
//!
//! Entity ids never travel in the packet; clients map records to entities
//! through the `players_order` / `balls_order` arrays of `initial_state`.

use crate::game::half::{push_half, read_half};
use crate::game::state::GameState;

pub const STATE_VERSION: u8 = 3;

const HEADER_LEN: usize = 7;
const PLAYER_LEN: usize = 9;
const BALL_LEN_V1: usize = 10;
const BALL_LEN_V3: usize = 11;

/// Serializes the dynamic state into one broadcast packet.
pub fn encode_state(version: u8, state: &GameState) -> Vec<u8> {
    let ball_len = if version >= 3 { BALL_LEN_V3 } else { BALL_LEN_V1 };
    let mut buf = Vec::with_capacity(
        HEADER_LEN + state.player_order.len() * PLAYER_LEN + state.ball_order.len() * ball_len + 2,
    );

    buf.push(version);
    buf.push(state.player_order.len() as u8);
    buf.push(state.ball_order.len() as u8);
    push_half(&mut buf, state.game_time);
    buf.push(state.score[0].min(u8::MAX as u32) as u8);
    buf.push(state.score[1].min(u8::MAX as u32) as u8);

    for id in &state.player_order {
        let player = &state.players[id];
        push_half(&mut buf, player.position.x);
        push_half(&mut buf, player.position.y);
        push_half(&mut buf, player.velocity.x);
        push_half(&mut buf, player.velocity.y);
        let mut flags = 0u8;
        if player.is_knocked_out {
            flags |= 0x01;
        }
        if state.has_ball(*id) {
            flags |= 0x02;
        }
        buf.push(flags);
    }

    for id in &state.ball_order {
        let ball = &state.balls[id];
        push_half(&mut buf, ball.position.x);
        push_half(&mut buf, ball.position.y);
        push_half(&mut buf, ball.velocity.x);
        push_half(&mut buf, ball.velocity.y);
        buf.push(u8::from(ball.holder_id.is_some()));
        buf.push(u8::from(ball.is_dead));
        if version >= 3 {
            buf.push(match ball.possession_team {
                None => 0,
                Some(team) => team + 1,
            });
        }
    }

    if version == 2 {
        buf.push(state.delay_bin);
        buf.push(state.possession_code());
    }

    buf
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPlayer {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub is_knocked_out: bool,
    pub has_ball: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBall {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub held: bool,
    pub is_dead: bool,
    /// Version 3 only; 0 on older packets.
    pub possession_code: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedState {
    pub version: u8,
    pub game_time: f32,
    pub score: [u8; 2],
    pub players: Vec<DecodedPlayer>,
    pub balls: Vec<DecodedBall>,
    /// Version 2 trailer only.
    pub delay_bin: Option<u8>,
    pub possession_code: Option<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("packet truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("unsupported state packet version {0}")]
    UnsupportedVersion(u8),
}

/// Parses a state packet of any supported version.
pub fn decode_state(buf: &[u8]) -> Result<DecodedState, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: HEADER_LEN,
            got: buf.len(),
        });
    }
    let version = buf[0];
    if !(1..=3).contains(&version) {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let player_count = buf[1] as usize;
    let ball_count = buf[2] as usize;
    let ball_len = if version >= 3 { BALL_LEN_V3 } else { BALL_LEN_V1 };
    let trailer = if version == 2 { 2 } else { 0 };
    let expected = HEADER_LEN + player_count * PLAYER_LEN + ball_count * ball_len + trailer;
    if buf.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            got: buf.len(),
        });
    }

    let game_time = read_half(&buf[3..5]);
    let score = [buf[5], buf[6]];

    let mut offset = HEADER_LEN;
    let mut players = Vec::with_capacity(player_count);
    for _ in 0..player_count {
        let flags = buf[offset + 8];
        players.push(DecodedPlayer {
            x: read_half(&buf[offset..]),
            y: read_half(&buf[offset + 2..]),
            vx: read_half(&buf[offset + 4..]),
            vy: read_half(&buf[offset + 6..]),
            is_knocked_out: flags & 0x01 != 0,
            has_ball: flags & 0x02 != 0,
        });
        offset += PLAYER_LEN;
    }

    let mut balls = Vec::with_capacity(ball_count);
    for _ in 0..ball_count {
        balls.push(DecodedBall {
            x: read_half(&buf[offset..]),
            y: read_half(&buf[offset + 2..]),
            vx: read_half(&buf[offset + 4..]),
            vy: read_half(&buf[offset + 6..]),
            held: buf[offset + 8] != 0,
            is_dead: buf[offset + 9] != 0,
            possession_code: if version >= 3 { buf[offset + 10] } else { 0 },
        });
        offset += ball_len;
    }

    let (delay_bin, possession_code) = if version == 2 {
        (Some(buf[offset]), Some(buf[offset + 1]))
    } else {
        (None, None)
    };

    Ok(DecodedState {
        version,
        game_time,
        score,
        players,
        balls,
        delay_bin,
        possession_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::entities::Role;
    use crate::game::vec2::Vec2;
    use assert_approx_eq::assert_approx_eq;
    use uuid::Uuid;

    fn sample_state() -> (GameConfig, GameState) {
        let config = GameConfig::default();
        let roster = vec![
            (Uuid::new_v4(), "alice".to_string(), 0, Role::Chaser),
            (Uuid::new_v4(), "bob".to_string(), 1, Role::Keeper),
        ];
        let mut state = GameState::new(&config, roster);
        state.game_time = 42.5;
        state.score = [3, 1];
        state.delay_bin = 5;

        let holder = state.player_order[0];
        {
            let player = state.players.get_mut(&holder).unwrap();
            player.position = Vec2::new(21.25, 7.5);
            player.velocity = Vec2::new(-3.5, 1.25);
            player.is_knocked_out = false;
        }
        let vb = state.volleyball_mut();
        vb.holder_id = Some(holder);
        vb.possession_team = Some(0);
        state.sync_held_balls();
        (config, state)
    }

    #[test]
    fn v3_layout_is_exact() {
        let (_, state) = sample_state();
        let buf = encode_state(3, &state);
        assert_eq!(buf.len(), 7 + 2 * 9 + 3 * 11);
        assert_eq!(buf[0], 3);
        assert_eq!(buf[1], 2);
        assert_eq!(buf[2], 3);
        assert_eq!(buf[5], 3);
        assert_eq!(buf[6], 1);
        // First player flags: holding, not knocked out.
        assert_eq!(buf[7 + 8], 0x02);
        // Volleyball record: held, alive, possessed by team 0.
        let ball0 = 7 + 2 * 9;
        assert_eq!(buf[ball0 + 8], 1);
        assert_eq!(buf[ball0 + 9], 0);
        assert_eq!(buf[ball0 + 10], 1);
    }

    #[test]
    fn v3_round_trip_within_half_precision() {
        let (_, state) = sample_state();
        let decoded = decode_state(&encode_state(3, &state)).unwrap();

        assert_eq!(decoded.version, 3);
        assert_eq!(decoded.score, [3, 1]);
        assert_eq!(decoded.players.len(), 2);
        assert_eq!(decoded.balls.len(), 3);
        assert_eq!(decoded.delay_bin, None);

        let holder = &state.players[&state.player_order[0]];
        let p0 = &decoded.players[0];
        for (got, want) in [
            (p0.x, holder.position.x),
            (p0.y, holder.position.y),
            (p0.vx, holder.velocity.x),
            (p0.vy, holder.velocity.y),
        ] {
            let tolerance = want.abs().max(1.0) * 2f32.powi(-10);
            assert!((got - want).abs() <= tolerance, "{got} vs {want}");
        }
        assert!(p0.has_ball);
        assert!(!p0.is_knocked_out);

        let vb = &decoded.balls[0];
        assert!(vb.held);
        assert!(!vb.is_dead);
        assert_eq!(vb.possession_code, 1);
        assert_approx_eq!(decoded.game_time, 42.5, 0.05);
    }

    #[test]
    fn v2_appends_delay_trailer() {
        let (_, state) = sample_state();
        let buf = encode_state(2, &state);
        assert_eq!(buf.len(), 7 + 2 * 9 + 3 * 10 + 2);
        let decoded = decode_state(&buf).unwrap();
        assert_eq!(decoded.delay_bin, Some(5));
        assert_eq!(decoded.possession_code, Some(1));
        // Per-ball possession is not present in v2.
        assert_eq!(decoded.balls[0].possession_code, 0);
    }

    #[test]
    fn v1_omits_possession_entirely() {
        let (_, state) = sample_state();
        let buf = encode_state(1, &state);
        assert_eq!(buf.len(), 7 + 2 * 9 + 3 * 10);
        let decoded = decode_state(&buf).unwrap();
        assert_eq!(decoded.delay_bin, None);
        assert_eq!(decoded.possession_code, None);
        // Positions and flags survive without the possession fields.
        assert!(decoded.players[0].has_ball);
        assert!(decoded.balls[0].held);
    }

    #[test]
    fn truncated_and_unknown_packets_are_rejected() {
        let (_, state) = sample_state();
        let buf = encode_state(3, &state);
        assert!(matches!(
            decode_state(&buf[..buf.len() - 1]),
            Err(DecodeError::Truncated { .. })
        ));
        let mut bad = buf.clone();
        bad[0] = 9;
        assert_eq!(decode_state(&bad), Err(DecodeError::UnsupportedVersion(9)));
    }
}
