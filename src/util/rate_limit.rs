//! Per-player input rate limiting for game sockets.

use std::num::NonZeroU32;

use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};

use crate::game::entities::PlayerId;

/// Ceiling on game-socket frames per player per second. A client sending one
/// movement intent per display frame stays well under this; floods get
/// dropped before they reach the room's input queue.
pub const INPUT_FRAMES_PER_SECOND: u32 = 120;

/// One limiter shared by every game socket, keyed by player id. A reconnect
/// or a duplicate socket for the same player draws from the same budget
/// instead of getting a fresh one.
pub struct InputRateLimiter {
    limiter: RateLimiter<PlayerId, DefaultKeyedStateStore<PlayerId>, DefaultClock>,
}

impl InputRateLimiter {
    pub fn new(frames_per_second: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(frames_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// True if this player may send another frame right now.
    pub fn check_input(&self, player_id: PlayerId) -> bool {
        self.limiter.check_key(&player_id).is_ok()
    }

    /// Drops buckets that have gone quiet, called when a game socket closes.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}

impl Default for InputRateLimiter {
    fn default() -> Self {
        Self::new(INPUT_FRAMES_PER_SECOND)
    }
}
