//! Game simulation modules

pub mod encoder;
pub mod entities;
pub mod half;
pub mod logic;
pub mod state;
pub mod vec2;

pub use logic::{GameEvent, GameLogic, TickInputs};
pub use state::GameState;
