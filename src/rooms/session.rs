//! The authoritative per-room tick task.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::GameConfig;
use crate::game::encoder::{encode_state, STATE_VERSION};
use crate::game::entities::PlayerId;
use crate::game::{GameEvent, GameLogic, GameState, TickInputs};
use crate::ws::protocol::{ConfigView, GameServerMsg, GameStateView};

use super::registry::RoomRegistry;
use super::{BroadcastFrame, RoomCommand, RoomId};

/// Ticks without any connected socket before the room tears itself down.
/// 60 seconds at the default 20 Hz.
const IDLE_TICKS_BEFORE_CLOSE: u32 = 1200;

/// Serializes the full `initial_state` frame for (re)connecting clients.
pub fn initial_state_json(config: &GameConfig, state: &GameState) -> String {
    let msg = GameServerMsg::InitialState {
        game_state: GameStateView::from_state(state),
        players_order: state.player_order.clone(),
        balls_order: state.ball_order.clone(),
        config: ConfigView::from_config(config),
    };
    serde_json::to_string(&msg).unwrap_or_default()
}

/// Owns one room's game state and is its sole writer. All other components
/// talk to the room through the input queue and the broadcast channel.
pub struct RoomSession {
    room_id: RoomId,
    config: Arc<GameConfig>,
    state: GameState,
    logic: GameLogic,
    input_rx: mpsc::Receiver<RoomCommand>,
    frames_tx: broadcast::Sender<BroadcastFrame>,
    latest_tx: watch::Sender<String>,
    /// Live socket count per player; a reconnect may overlap the old
    /// socket's teardown, so this is a counter rather than a set.
    connections: HashMap<PlayerId, u32>,
    idle_ticks: u32,
}

impl RoomSession {
    pub fn new(
        room_id: RoomId,
        config: Arc<GameConfig>,
        state: GameState,
        input_rx: mpsc::Receiver<RoomCommand>,
        frames_tx: broadcast::Sender<BroadcastFrame>,
        latest_tx: watch::Sender<String>,
    ) -> Self {
        let logic = GameLogic::new(config.clone());
        Self {
            room_id,
            config,
            state,
            logic,
            input_rx,
            frames_tx,
            latest_tx,
            connections: HashMap::new(),
            idle_ticks: 0,
        }
    }

    /// Runs the fixed-cadence tick loop until the room empties out or an
    /// invariant violation forces a teardown. Only this room is affected.
    pub async fn run(mut self, registry: Arc<RoomRegistry>) {
        info!(room_id = %self.room_id, "tick task started");

        let dt = self.config.dt();
        let mut ticker = interval(self.config.tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let inputs = self.drain_inputs();
            let events = self.logic.step(&mut self.state, dt, &inputs);

            if let Err(violation) = self.state.check_invariants(&self.config) {
                error!(
                    room_id = %self.room_id,
                    error = %violation,
                    "invariant violation during tick, closing room"
                );
                break;
            }

            // Broadcasts never block on slow clients: the channel hands each
            // socket its own cursor and laggards just skip frames.
            let packet = encode_state(STATE_VERSION, &self.state);
            let _ = self.frames_tx.send(BroadcastFrame::Binary(packet));

            if !events.is_empty() {
                self.broadcast_events(&events);
            }

            self.latest_tx
                .send_replace(initial_state_json(&self.config, &self.state));

            if self.connections.is_empty() {
                self.idle_ticks += 1;
                if self.idle_ticks >= IDLE_TICKS_BEFORE_CLOSE {
                    info!(room_id = %self.room_id, "no connected players, closing room");
                    break;
                }
            } else {
                self.idle_ticks = 0;
            }
        }

        registry.remove_room(&self.room_id);
    }

    /// Drains the input queue. Movement intents coalesce per player (latest
    /// wins); throws keep their arrival order.
    fn drain_inputs(&mut self) -> TickInputs {
        let mut inputs = TickInputs::default();
        while let Ok(command) = self.input_rx.try_recv() {
            match command {
                RoomCommand::Move {
                    player_id,
                    direction,
                } => {
                    inputs.moves.insert(player_id, direction);
                }
                RoomCommand::Throw { player_id } => inputs.throws.push(player_id),
                RoomCommand::Connected { player_id } => {
                    *self.connections.entry(player_id).or_insert(0) += 1;
                    self.state.resume_player(player_id);
                    info!(room_id = %self.room_id, player = %player_id, "player connected");
                }
                RoomCommand::Disconnected { player_id } => {
                    if let Some(count) = self.connections.get_mut(&player_id) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            self.connections.remove(&player_id);
                            self.state.pause_player(&self.config, player_id);
                            info!(
                                room_id = %self.room_id,
                                player = %player_id,
                                "player disconnected"
                            );
                        }
                    }
                }
            }
        }
        inputs
    }

    /// Rule events get an out-of-band JSON state frame carrying the fields
    /// the binary packet does not (delay_bin rides here, not in the packet).
    fn broadcast_events(&self, events: &[GameEvent]) {
        for event in events {
            info!(room_id = %self.room_id, ?event, "game event");
        }
        let update = GameServerMsg::StateUpdate {
            game_state: GameStateView::from_state(&self.state),
            delay_bin: self.state.delay_bin,
            possession_code: self.state.possession_code(),
        };
        if let Ok(json) = serde_json::to_string(&update) {
            let _ = self.frames_tx.send(BroadcastFrame::Json(json));
        }
    }
}
