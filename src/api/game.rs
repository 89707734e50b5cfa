use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::{
        game::{index_to_row_col, row_col_to_index},
        ApiResponse, Board, GameStatus, Side, WinningLine,
    },
    services::tx_lifecycle::TxView,
};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct GameStateResponse {
    pub board: Board,
    pub status: GameStatus,
    pub status_label: String,
    pub turn: Side,
    pub turn_label: String,
    pub is_my_turn: bool,
    pub winning_line: Option<WinningLine>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub transaction: TxView,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub index: Option<usize>,
    pub row: Option<u8>,
    pub col: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ValidMoveQuery {
    pub row: u8,
    pub col: u8,
}

#[derive(Debug, Serialize)]
pub struct ValidMoveResponse {
    pub row: u8,
    pub col: u8,
    pub index: usize,
    pub valid: bool,
}

// Internal helper that parses or transforms values for `resolve_move_index`.
fn resolve_move_index(req: &MoveRequest) -> Result<usize> {
    match (req.index, req.row, req.col) {
        (Some(index), None, None) => {
            index_to_row_col(index)?;
            Ok(index)
        }
        (None, Some(row), Some(col)) => row_col_to_index(row, col),
        _ => Err(AppError::BadRequest(
            "Provide either index or both row and col".to_string(),
        )),
    }
}

fn turn_label(turn: Side, local: Side) -> String {
    if turn == local {
        format!("Your turn ({})", turn.mark().display())
    } else {
        format!("Computer's turn ({})", turn.mark().display())
    }
}

/// GET /api/v1/game/state
pub async fn get_game_state(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<GameStateResponse>>> {
    let snapshot = state.sync.snapshot().await;
    let local = state.session.side();

    let response = GameStateResponse {
        board: snapshot.board,
        status: snapshot.status,
        status_label: snapshot.status.label_for(local).to_string(),
        turn: snapshot.turn,
        turn_label: turn_label(snapshot.turn, local),
        is_my_turn: snapshot.status.is_active() && snapshot.turn == local,
        winning_line: snapshot.winning_line,
        last_synced_at: state.sync.last_synced_at().await,
        transaction: state.lifecycle.view(),
    };

    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/v1/game/move
pub async fn make_move(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TxView>>)> {
    let index = resolve_move_index(&req)?;
    // Runs to completion in the background; progress is reported via state.
    let _ = state.lifecycle.start_move(index).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(state.lifecycle.view())),
    ))
}

/// POST /api/v1/game/reset
pub async fn reset_game(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<TxView>>)> {
    let _ = state.lifecycle.start_reset().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(state.lifecycle.view())),
    ))
}

/// GET /api/v1/game/valid-move?row=&col=
pub async fn check_valid_move(
    State(state): State<AppState>,
    Query(query): Query<ValidMoveQuery>,
) -> Result<Json<ApiResponse<ValidMoveResponse>>> {
    let index = row_col_to_index(query.row, query.col)?;
    let valid = state.gateway.is_valid_move(query.row, query.col).await?;

    Ok(Json(ApiResponse::success(ValidMoveResponse {
        row: query.row,
        col: query.col,
        index,
        valid,
    })))
}
