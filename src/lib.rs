//! Quadball Game Server - authoritative realtime core
//!
//! The server owns the truth for every running game:
//! - per-room fixed-timestep simulation driven by a dedicated tick task
//! - WebSocket lobby protocol for room creation and roster management
//! - WebSocket game protocol fanning player intents in and broadcasting
//!   compact half-precision binary state out

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod rooms;
pub mod util;
pub mod ws;
