//! Application state shared across routes

use std::sync::Arc;

use crate::config::GameConfig;
use crate::rooms::RoomRegistry;
use crate::util::rate_limit::InputRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GameConfig>,
    pub rooms: Arc<RoomRegistry>,
    pub input_limits: Arc<InputRateLimiter>,
}

impl AppState {
    pub fn new(config: GameConfig) -> Self {
        let config = Arc::new(config);
        let rooms = Arc::new(RoomRegistry::new(config.clone()));
        let input_limits = Arc::new(InputRateLimiter::default());
        Self {
            config,
            rooms,
            input_limits,
        }
    }
}
