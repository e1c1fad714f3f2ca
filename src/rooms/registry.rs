//! Registry of all rooms, lobby phase roster management, and the handoff
//! into the running game session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::ws::Message;
use rand::Rng;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::entities::{PlayerId, Role, Team};
use crate::game::state::GameState;
use crate::ws::protocol::{LobbyServerMsg, RoomSummary, RosterEntry};

use super::session::{initial_state_json, RoomSession};
use super::{BroadcastFrame, GameAttachment, RoomCommand, RoomId};

/// Lobby peer identifier, one per lobby socket connection.
pub type PeerId = Uuid;

const ROOM_ID_LEN: usize = 6;
const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

const INPUT_CHANNEL_CAPACITY: usize = 256;
const BROADCAST_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Game has not started yet")]
    NotStarted,

    #[error("Only the room creator can start the game")]
    NotCreator,

    #[error("Player not found in room")]
    UnknownPlayer,

    #[error("Team must be 0 or 1")]
    InvalidTeam,
}

/// Channels of a running room, kept for late game-socket attachments.
struct RoomLink {
    input_tx: mpsc::Sender<RoomCommand>,
    frames_tx: broadcast::Sender<BroadcastFrame>,
    latest_state: watch::Receiver<String>,
}

enum RoomPhase {
    Lobby,
    Running(RoomLink),
}

struct Room {
    id: RoomId,
    creator_peer: PeerId,
    creator_name: String,
    roster: HashMap<PlayerId, RosterEntry>,
    roster_order: Vec<PlayerId>,
    max_players: usize,
    lobby_peers: HashMap<PeerId, mpsc::UnboundedSender<Message>>,
    peer_of_player: HashMap<PlayerId, PeerId>,
    phase: RoomPhase,
}

impl Room {
    fn roster_entries(&self) -> Vec<RosterEntry> {
        self.roster_order
            .iter()
            .filter_map(|id| self.roster.get(id).cloned())
            .collect()
    }

    fn seat_player(&mut self, peer: PeerId, name: String, team: Team, role: Role) -> PlayerId {
        let player_id = Uuid::new_v4();
        self.roster.insert(
            player_id,
            RosterEntry {
                id: player_id,
                name,
                team,
                role,
            },
        );
        self.roster_order.push(player_id);
        self.peer_of_player.insert(player_id, peer);
        player_id
    }

    /// Defaults for a joining player: the lighter team, then the first
    /// unfilled role slot (keeper, chasers, beaters, seeker).
    fn balanced_assignment(&self) -> (Team, Role) {
        let count = |team: Team| self.roster.values().filter(|e| e.team == team).count();
        let team = if count(1) < count(0) { 1 } else { 0 };

        let with_role =
            |role: Role| self.roster.values().filter(|e| e.team == team && e.role == role).count();
        let role = if with_role(Role::Keeper) == 0 {
            Role::Keeper
        } else if with_role(Role::Chaser) < 3 {
            Role::Chaser
        } else if with_role(Role::Beater) < 2 {
            Role::Beater
        } else if with_role(Role::Seeker) == 0 {
            Role::Seeker
        } else {
            Role::Chaser
        };
        (team, role)
    }

    /// Sends a lobby message to every peer of the room, pruning dead ones.
    fn broadcast(&mut self, msg: &LobbyServerMsg) {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                warn!(room_id = %self.id, error = %e, "failed to serialize lobby broadcast");
                return;
            }
        };
        self.lobby_peers
            .retain(|_, tx| tx.send(Message::Text(json.clone())).is_ok());
    }
}

/// Thread-safe registry of all rooms, lobby and running alike. Per-room game
/// state never lives here; it is owned exclusively by the room's tick task.
pub struct RoomRegistry {
    config: Arc<GameConfig>,
    rooms: Mutex<HashMap<RoomId, Room>>,
}

impl RoomRegistry {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a room and seats the creator as its first player.
    pub fn create_room(
        &self,
        peer: PeerId,
        peer_tx: mpsc::UnboundedSender<Message>,
        player_name: String,
    ) -> (RoomId, PlayerId, Vec<RosterEntry>) {
        let mut rooms = self.rooms.lock().expect("registry lock");
        let room_id = loop {
            let candidate = random_room_id();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let mut room = Room {
            id: room_id.clone(),
            creator_peer: peer,
            creator_name: player_name.clone(),
            roster: HashMap::new(),
            roster_order: Vec::new(),
            max_players: self.config.max_players_per_room,
            lobby_peers: HashMap::new(),
            peer_of_player: HashMap::new(),
            phase: RoomPhase::Lobby,
        };
        let player_id = room.seat_player(peer, player_name, 0, Role::Chaser);
        room.lobby_peers.insert(peer, peer_tx);
        let players = room.roster_entries();

        info!(room_id = %room_id, creator = %player_id, "room created");
        rooms.insert(room_id.clone(), room);
        (room_id, player_id, players)
    }

    /// Rooms still in the lobby phase with a free seat.
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.lock().expect("registry lock");
        rooms
            .values()
            .filter(|room| {
                matches!(room.phase, RoomPhase::Lobby) && room.roster.len() < room.max_players
            })
            .map(|room| RoomSummary {
                room_id: room.id.clone(),
                creator_name: room.creator_name.clone(),
                players_count: room.roster.len(),
                max_players: room.max_players,
            })
            .collect()
    }

    /// Seats a player into a lobby-phase room with balanced defaults and
    /// notifies every lobby peer of the new roster.
    pub fn join_room(
        &self,
        room_id: &str,
        peer: PeerId,
        peer_tx: mpsc::UnboundedSender<Message>,
        player_name: String,
    ) -> Result<(PlayerId, Vec<RosterEntry>), RoomError> {
        let mut rooms = self.rooms.lock().expect("registry lock");
        let room = rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        if !matches!(room.phase, RoomPhase::Lobby) {
            return Err(RoomError::AlreadyStarted);
        }
        if room.roster.len() >= room.max_players {
            return Err(RoomError::RoomFull);
        }

        let (team, role) = room.balanced_assignment();
        let player_id = room.seat_player(peer, player_name, team, role);
        room.lobby_peers.insert(peer, peer_tx);

        let players = room.roster_entries();
        room.broadcast(&LobbyServerMsg::PlayersUpdated {
            players: players.clone(),
        });
        info!(room_id = %room_id, player = %player_id, team, "player joined room");
        Ok((player_id, players))
    }

    /// Mutates a roster entry and rebroadcasts the roster. Identical updates
    /// produce identical broadcasts.
    pub fn update_player(
        &self,
        room_id: &str,
        player_id: PlayerId,
        team: Option<Team>,
        role: Option<Role>,
    ) -> Result<(), RoomError> {
        if matches!(team, Some(t) if t > 1) {
            return Err(RoomError::InvalidTeam);
        }
        let mut rooms = self.rooms.lock().expect("registry lock");
        let room = rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        if !matches!(room.phase, RoomPhase::Lobby) {
            return Err(RoomError::AlreadyStarted);
        }
        let entry = room
            .roster
            .get_mut(&player_id)
            .ok_or(RoomError::UnknownPlayer)?;
        if let Some(team) = team {
            entry.team = team;
        }
        if let Some(role) = role {
            entry.role = role;
        }
        let players = room.roster_entries();
        room.broadcast(&LobbyServerMsg::PlayersUpdated { players });
        Ok(())
    }

    /// Builds the initial game state from the roster, spawns the tick task,
    /// and tells every lobby peer (with its own player id) to switch over to
    /// the game socket. Creator only.
    pub fn start_game(self: &Arc<Self>, room_id: &str, peer: PeerId) -> Result<(), RoomError> {
        let mut rooms = self.rooms.lock().expect("registry lock");
        let room = rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        if !matches!(room.phase, RoomPhase::Lobby) {
            return Err(RoomError::AlreadyStarted);
        }
        if room.creator_peer != peer {
            return Err(RoomError::NotCreator);
        }

        let roster = room.roster_order.iter().filter_map(|id| {
            let entry = room.roster.get(id)?;
            Some((entry.id, entry.name.clone(), entry.team, entry.role))
        });
        let state = GameState::new(&self.config, roster);

        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (frames_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        let (latest_tx, latest_rx) = watch::channel(initial_state_json(&self.config, &state));

        let session = RoomSession::new(
            room.id.clone(),
            self.config.clone(),
            state,
            input_rx,
            frames_tx.clone(),
            latest_tx,
        );
        tokio::spawn(session.run(Arc::clone(self)));

        room.phase = RoomPhase::Running(RoomLink {
            input_tx,
            frames_tx,
            latest_state: latest_rx,
        });

        // Every lobby peer gets its own player id for the game handoff.
        let notifications: Vec<(PeerId, Option<PlayerId>)> = room
            .lobby_peers
            .keys()
            .map(|peer_id| {
                let player = room
                    .peer_of_player
                    .iter()
                    .find(|(_, p)| *p == peer_id)
                    .map(|(player_id, _)| *player_id);
                (*peer_id, player)
            })
            .collect();
        for (peer_id, player_id) in notifications {
            let msg = LobbyServerMsg::StartSuccessful {
                room_id: room.id.clone(),
                player_id,
            };
            if let (Ok(json), Some(tx)) =
                (serde_json::to_string(&msg), room.lobby_peers.get(&peer_id))
            {
                let _ = tx.send(Message::Text(json));
            }
        }

        info!(room_id = %room_id, players = room.roster.len(), "game started");
        Ok(())
    }

    /// Hands a game socket the channels of its running room.
    pub fn attach_game(
        &self,
        room_id: &str,
        player_id: PlayerId,
    ) -> Result<GameAttachment, RoomError> {
        let rooms = self.rooms.lock().expect("registry lock");
        let room = rooms.get(room_id).ok_or(RoomError::NotFound)?;
        if !room.roster.contains_key(&player_id) {
            return Err(RoomError::UnknownPlayer);
        }
        let RoomPhase::Running(link) = &room.phase else {
            return Err(RoomError::NotStarted);
        };
        let attachment = GameAttachment {
            player_id,
            input_tx: link.input_tx.clone(),
            frames: link.frames_tx.subscribe(),
            initial_state: link.latest_state.borrow().clone(),
        };
        Ok(attachment)
    }

    /// Forgets a lobby socket. Roster entries stay; the peer simply stops
    /// receiving lobby broadcasts.
    pub fn drop_peer(&self, peer: PeerId) {
        let mut rooms = self.rooms.lock().expect("registry lock");
        for room in rooms.values_mut() {
            room.lobby_peers.remove(&peer);
        }
    }

    /// Tears a room out of the registry. Dropping the room's channels closes
    /// every attached game socket with a normal close code.
    pub fn remove_room(&self, room_id: &str) {
        let mut rooms = self.rooms.lock().expect("registry lock");
        if rooms.remove(room_id).is_some() {
            info!(room_id = %room_id, "room removed");
        }
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.lock().expect("registry lock").len()
    }

    pub fn total_players(&self) -> usize {
        let rooms = self.rooms.lock().expect("registry lock");
        rooms.values().map(|room| room.roster.len()).sum()
    }
}

fn random_room_id() -> RoomId {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LEN)
        .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect()
}
