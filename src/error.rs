use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ledger RPC error: {0}")]
    LedgerRpc(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Another transaction is already in flight")]
    Busy,

    #[error("Cell already occupied")]
    CellOccupied,

    #[error("Game is not active")]
    GameNotActive,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AppError::Busy => (StatusCode::CONFLICT, "TX_IN_FLIGHT"),
            AppError::CellOccupied => (StatusCode::CONFLICT, "CELL_OCCUPIED"),
            AppError::GameNotActive => (StatusCode::CONFLICT, "GAME_NOT_ACTIVE"),
            AppError::NotYourTurn => (StatusCode::CONFLICT, "NOT_YOUR_TURN"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::LedgerRpc(_) | AppError::SubmissionRejected(_) => {
                (StatusCode::BAD_GATEWAY, "LEDGER_ERROR")
            }
            AppError::Redis(_) | AppError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR")
            }
            AppError::Decode(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
