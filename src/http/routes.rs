//! HTTP route definitions

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::ws::game::game_handler;
use crate::ws::lobby::lobby_handler;

/// Build the application router. Static assets and the browser pages are
/// served by an external file server; this process only exposes the realtime
/// endpoints and a health check.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/lobby", get(lobby_handler))
        .route("/ws/game/:room_id/:player_id", get(game_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_rooms: state.rooms.active_rooms(),
        active_players: state.rooms.total_players(),
    })
}
