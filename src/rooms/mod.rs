//! Room lifecycle: lobby roster management and the per-room tick task.

pub mod registry;
pub mod session;

pub use registry::{RoomError, RoomRegistry};

use tokio::sync::{broadcast, mpsc};

use crate::game::entities::PlayerId;
use crate::game::vec2::Vec2;

/// Short base32 room identifier.
pub type RoomId = String;

/// Commands posted onto a room's input queue. The tick task is the sole
/// writer of the room's game state; everything else goes through here.
#[derive(Debug, Clone)]
pub enum RoomCommand {
    Move { player_id: PlayerId, direction: Vec2 },
    Throw { player_id: PlayerId },
    Connected { player_id: PlayerId },
    Disconnected { player_id: PlayerId },
}

/// One outbound frame of a room's broadcast stream.
#[derive(Debug, Clone)]
pub enum BroadcastFrame {
    /// Binary state packet, sent every tick.
    Binary(Vec<u8>),
    /// JSON event frame (goal, turnover, inbounding).
    Json(String),
}

/// Everything a game socket needs to take part in a running room.
pub struct GameAttachment {
    pub player_id: PlayerId,
    pub input_tx: mpsc::Sender<RoomCommand>,
    pub frames: broadcast::Receiver<BroadcastFrame>,
    /// Serialized `initial_state` frame as of attach time.
    pub initial_state: String,
}
