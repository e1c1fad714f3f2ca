//! WebSocket surface: protocol types and the lobby/game socket handlers.

pub mod game;
pub mod lobby;
pub mod protocol;
