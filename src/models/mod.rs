// src/models/mod.rs
pub mod game;
pub mod stats;

use serde::Serialize;

pub use game::{Board, Cell, GameSnapshot, GameStatus, Side, WinningLine};
pub use stats::{GameRecord, Outcome, PlayerStats, SortBy, StatsByAddress, StatsSnapshot};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
