//! Server arguments and gameplay configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::game::entities::{BallType, Role, Team};
use crate::game::vec2::Vec2;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative quadball game server")]
pub struct ServerArgs {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ServerArgs {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address format")]
    InvalidAddress,
}

/// Gameplay tuning. Everything the rules engine needs is an explicit field
/// here rather than a scattered constant.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Pitch length along x, in meters.
    pub pitch_length: f32,
    /// Pitch width along y, in meters.
    pub pitch_width: f32,
    /// Width of each keeper zone strip along the short ends.
    pub keeper_zone_x: f32,
    /// Distance of the hoop line from the own goal line.
    pub hoop_offset_x: f32,
    /// Vertical spacing between adjacent hoops.
    pub hoop_spacing: f32,
    pub hoop_radius: f32,
    pub hoop_thickness: f32,

    pub player_radius: f32,
    pub volleyball_radius: f32,
    pub dodgeball_radius: f32,

    /// Simulation rate in ticks per second.
    pub tick_hz: u32,

    /// Per-role speed caps in m/s.
    pub keeper_max_speed: f32,
    pub chaser_max_speed: f32,
    pub beater_max_speed: f32,
    pub seeker_max_speed: f32,
    /// Velocity lerp factor per second toward the target velocity.
    pub accel_factor: f32,

    pub volleyball_throw_speed: f32,
    pub dodgeball_throw_speed: f32,
    /// Linear drag on free balls, fraction of velocity lost per second.
    pub ball_drag: f32,
    /// Velocity kept when a ball reflects off a wall.
    pub wall_restitution: f32,

    /// Seconds a beaten player stays down.
    pub knockout_duration: f32,
    /// Delay-of-game bins before a forced turnover.
    pub delay_cap: u8,
    /// Chasers cannot pick up the volleyball within this distance of their
    /// own hoops.
    pub goaltending_radius: f32,
    /// Seconds the inbounding team has exclusive pickup rights.
    pub inbound_lock_secs: f32,
    /// Goals are void this long after a keeper touch inside their own zone.
    pub keeper_clearance_window: f32,

    /// Roster cap per room.
    pub max_players_per_room: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pitch_length: 60.0,
            pitch_width: 33.0,
            keeper_zone_x: 12.0,
            hoop_offset_x: 9.0,
            hoop_spacing: 2.75,
            hoop_radius: 0.43,
            hoop_thickness: 0.1,

            player_radius: 0.3,
            volleyball_radius: 0.106,
            dodgeball_radius: 0.111,

            tick_hz: 20,

            keeper_max_speed: 5.5,
            chaser_max_speed: 6.0,
            beater_max_speed: 6.0,
            seeker_max_speed: 6.5,
            accel_factor: 8.0,

            volleyball_throw_speed: 15.0,
            dodgeball_throw_speed: 18.0,
            ball_drag: 0.3,
            wall_restitution: 0.8,

            knockout_duration: 5.0,
            delay_cap: 8,
            goaltending_radius: 2.5,
            inbound_lock_secs: 5.0,
            keeper_clearance_window: 0.2,

            max_players_per_room: 12,
        }
    }
}

impl GameConfig {
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_hz as u64)
    }

    pub fn max_speed(&self, role: Role) -> f32 {
        match role {
            Role::Keeper => self.keeper_max_speed,
            Role::Chaser => self.chaser_max_speed,
            Role::Beater => self.beater_max_speed,
            Role::Seeker => self.seeker_max_speed,
        }
    }

    pub fn throw_speed(&self, ball_type: BallType) -> f32 {
        match ball_type {
            BallType::Volleyball => self.volleyball_throw_speed,
            BallType::Dodgeball => self.dodgeball_throw_speed,
        }
    }

    pub fn ball_radius(&self, ball_type: BallType) -> f32 {
        match ball_type {
            BallType::Volleyball => self.volleyball_radius,
            BallType::Dodgeball => self.dodgeball_radius,
        }
    }

    pub fn midline_x(&self) -> f32 {
        self.pitch_length / 2.0
    }

    /// Mirrors a distance from the own goal line into pitch coordinates.
    pub fn from_own_goal(&self, team: Team, distance: f32) -> f32 {
        if team == 0 {
            distance
        } else {
            self.pitch_length - distance
        }
    }

    /// True if the position lies inside the given team's keeper zone.
    pub fn keeper_zone_contains(&self, team: Team, position: Vec2) -> bool {
        if team == 0 {
            position.x <= self.keeper_zone_x
        } else {
            position.x >= self.pitch_length - self.keeper_zone_x
        }
    }

    /// The central band where delay-of-game accumulates.
    pub fn central_band_contains(&self, x: f32) -> bool {
        x >= self.keeper_zone_x && x <= self.pitch_length - self.keeper_zone_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeper_zones_are_mirrored() {
        let cfg = GameConfig::default();
        assert!(cfg.keeper_zone_contains(0, Vec2::new(5.0, 16.5)));
        assert!(!cfg.keeper_zone_contains(1, Vec2::new(5.0, 16.5)));
        assert!(cfg.keeper_zone_contains(1, Vec2::new(55.0, 16.5)));
        assert!(!cfg.keeper_zone_contains(0, Vec2::new(30.0, 16.5)));
    }

    #[test]
    fn central_band_excludes_keeper_zones() {
        let cfg = GameConfig::default();
        assert!(cfg.central_band_contains(30.0));
        assert!(cfg.central_band_contains(12.0));
        assert!(!cfg.central_band_contains(11.9));
        assert!(!cfg.central_band_contains(48.1));
    }

    #[test]
    fn tick_rate_default() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.tick_duration(), Duration::from_millis(50));
        assert!((cfg.dt() - 0.05).abs() < f32::EPSILON);
    }
}
