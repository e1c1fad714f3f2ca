//! Game WebSocket handler: binary movement intents in, state frames out.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::half::read_half;
use crate::game::vec2::Vec2;
use crate::rooms::{BroadcastFrame, RoomCommand};
use crate::ws::protocol::GameClientMsg;

pub async fn game_handler(
    ws: WebSocketUpgrade,
    Path((room_id, player_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let Ok(player_id) = Uuid::parse_str(&player_id) else {
        return (StatusCode::BAD_REQUEST, "invalid player id").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, player_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, room_id: String, player_id: Uuid) {
    let attachment = match state.rooms.attach_game(&room_id, player_id) {
        Ok(attachment) => attachment,
        Err(e) => {
            warn!(room_id = %room_id, player = %player_id, error = %e, "game attach rejected");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    info!(room_id = %room_id, player = %player_id, "game connection opened");
    let (mut ws_sink, mut ws_stream) = socket.split();

    // First frame: the full JSON snapshot with id orders and config.
    if ws_sink
        .send(Message::Text(attachment.initial_state))
        .await
        .is_err()
    {
        return;
    }
    let input_tx = attachment.input_tx;
    let _ = input_tx.send(RoomCommand::Connected { player_id }).await;

    // Writer: room broadcast -> socket, plus a control lane the reader uses
    // to close with a descriptive reason. A lagging client skips frames; the
    // state is self-synchronizing on the next tick.
    let mut frames = attachment.frames;
    let (ctl_tx, mut ctl_rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
    let writer_player = player_id;
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Ok(BroadcastFrame::Binary(packet)) => {
                        if ws_sink.send(Message::Binary(packet)).await.is_err() {
                            break;
                        }
                    }
                    Ok(BroadcastFrame::Json(json)) => {
                        if ws_sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(
                            player = %writer_player,
                            skipped = n,
                            "client lagged, dropping frames"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Room teardown: close out cleanly.
                        let _ = ws_sink
                            .send(Message::Close(Some(CloseFrame {
                                code: close_code::NORMAL,
                                reason: "room closed".into(),
                            })))
                            .await;
                        break;
                    }
                },
                ctl = ctl_rx.recv() => match ctl {
                    Some(msg) => {
                        let closing = matches!(msg, Message::Close(_));
                        if ws_sink.send(msg).await.is_err() || closing {
                            break;
                        }
                    }
                    // Reader is gone; the socket is shutting down.
                    None => break,
                },
            }
        }
    });

    // Reader: socket -> room input queue.
    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(Message::Binary(bytes)) => {
                if !state.input_limits.check_input(player_id) {
                    continue;
                }
                // Movement intent: two little-endian half floats.
                if bytes.len() < 4 {
                    warn!(player = %player_id, "undersized movement frame");
                    let _ = ctl_tx.send(Message::Close(Some(CloseFrame {
                        code: close_code::PROTOCOL,
                        reason: "movement frames are two little-endian half floats".into(),
                    })));
                    break;
                }
                let dx = read_half(&bytes[0..2]);
                let dy = read_half(&bytes[2..4]);
                if !dx.is_finite() || !dy.is_finite() {
                    debug!(player = %player_id, "non-finite movement intent dropped");
                    continue;
                }
                if input_tx
                    .send(RoomCommand::Move {
                        player_id,
                        direction: Vec2::new(dx, dy),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                if !state.input_limits.check_input(player_id) {
                    continue;
                }
                match serde_json::from_str::<GameClientMsg>(&text) {
                    Ok(GameClientMsg::Throw) => {
                        if input_tx
                            .send(RoomCommand::Throw { player_id })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player = %player_id, error = %e, "malformed game message");
                        let _ = ctl_tx.send(Message::Close(Some(CloseFrame {
                            code: close_code::PROTOCOL,
                            reason: "malformed game message".into(),
                        })));
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                debug!(player = %player_id, "game client closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(player = %player_id, error = %e, "game socket error");
                break;
            }
        }
    }

    // Pause the player; a reconnect with the same id resumes control.
    let _ = input_tx.send(RoomCommand::Disconnected { player_id }).await;
    state.input_limits.prune();
    drop(ctl_tx);
    let _ = writer.await;
    info!(room_id = %room_id, player = %player_id, "game connection closed");
}
