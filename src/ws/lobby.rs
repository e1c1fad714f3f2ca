//! Lobby WebSocket handler: room creation, joining, roster edits, start.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::rooms::registry::PeerId;
use crate::ws::protocol::{LobbyClientMsg, LobbyServerMsg};

pub async fn lobby_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let peer_id: PeerId = Uuid::new_v4();
    info!(peer = %peer_id, "lobby connection opened");

    let (mut ws_sink, mut ws_stream) = socket.split();
    // All outbound traffic funnels through one writer task, so registry
    // broadcasts to this peer never block the lobby mutex.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<LobbyClientMsg>(&text) {
                Ok(msg) => dispatch(&state, peer_id, &tx, msg),
                Err(e) => {
                    warn!(peer = %peer_id, error = %e, "malformed lobby message");
                    let _ = tx.send(Message::Close(Some(CloseFrame {
                        code: close_code::PROTOCOL,
                        reason: "malformed lobby message".into(),
                    })));
                    break;
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(peer = %peer_id, "unexpected binary frame on lobby socket");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: close_code::PROTOCOL,
                    reason: "binary frames are not part of the lobby protocol".into(),
                })));
                break;
            }
            Ok(Message::Close(_)) => {
                debug!(peer = %peer_id, "lobby client closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(peer = %peer_id, error = %e, "lobby socket error");
                break;
            }
        }
    }

    state.rooms.drop_peer(peer_id);
    drop(tx);
    let _ = writer.await;
    info!(peer = %peer_id, "lobby connection closed");
}

fn dispatch(
    state: &AppState,
    peer_id: PeerId,
    tx: &mpsc::UnboundedSender<Message>,
    msg: LobbyClientMsg,
) {
    let reply = |msg: &LobbyServerMsg| {
        if let Ok(json) = serde_json::to_string(msg) {
            let _ = tx.send(Message::Text(json));
        }
    };

    match msg {
        LobbyClientMsg::CreateRoom { player_name } => {
            let (room_id, player_id, players) =
                state.rooms.create_room(peer_id, tx.clone(), player_name);
            reply(&LobbyServerMsg::RoomCreated {
                room_id,
                player_id,
                players,
            });
        }
        LobbyClientMsg::JoinRoom {
            room_id,
            player_name,
        } => match state
            .rooms
            .join_room(&room_id, peer_id, tx.clone(), player_name)
        {
            Ok((player_id, players)) => reply(&LobbyServerMsg::JoinSuccessful {
                room_id,
                player_id,
                players,
            }),
            Err(e) => reply(&LobbyServerMsg::JoinFailed {
                error: e.to_string(),
            }),
        },
        LobbyClientMsg::ListRooms => {
            reply(&LobbyServerMsg::RoomsList {
                rooms: state.rooms.list_rooms(),
            });
        }
        LobbyClientMsg::UpdatePlayer {
            room_id,
            player_id,
            team,
            role,
        } => {
            if let Err(e) = state.rooms.update_player(&room_id, player_id, team, role) {
                reply(&LobbyServerMsg::UpdateFailed {
                    error: e.to_string(),
                });
            }
        }
        LobbyClientMsg::StartGame { room_id } => {
            if let Err(e) = state.rooms.start_game(&room_id, peer_id) {
                reply(&LobbyServerMsg::StartFailed {
                    error: e.to_string(),
                });
            }
        }
    }
}
