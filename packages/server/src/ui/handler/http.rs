//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::{RoomError, RoomId},
    infrastructure::dto::http::{ResultRecordDto, RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of active rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.room_store.list_rooms().await;

    // Domain Model から DTO への変換
    Json(rooms.iter().map(RoomSummaryDto::from).collect())
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room_id = RoomId::new(room_id).map_err(|_| StatusCode::NOT_FOUND)?;
    match state.room_store.snapshot(&room_id).await {
        Ok(snapshot) => Ok(Json(RoomDetailDto::from(&snapshot))),
        Err(RoomError::RoomNotFound) => Err(StatusCode::NOT_FOUND),
        Err(RoomError::SessionClosed) => Err(StatusCode::GONE),
        Err(e) => {
            tracing::warn!("Failed to read room {}: {}", room_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get persisted results of a room, ordered by rank
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ResultRecordDto>>, StatusCode> {
    let room_id = RoomId::new(room_id).map_err(|_| StatusCode::NOT_FOUND)?;
    match state.result_store.results_for_room(room_id).await {
        Ok(records) => Ok(Json(records.iter().map(ResultRecordDto::from).collect())),
        Err(e) => {
            tracing::warn!("Result store unavailable: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
