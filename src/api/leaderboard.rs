use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::str::FromStr;

use crate::{
    error::Result,
    models::{ApiResponse, PlayerStats, SortBy},
    utils::format_address,
};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub address: String,
    pub display_address: String,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_rate: f64,
    pub last_played_at: i64,
}

impl LeaderboardEntry {
    pub fn from_ranked(rank: usize, stats: PlayerStats) -> Self {
        Self {
            rank,
            display_address: format_address(&stats.address),
            address: stats.address,
            games_played: stats.games_played,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
            win_rate: stats.win_rate,
            last_played_at: stats.last_played_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub sort_by: SortBy,
    pub entries: Vec<LeaderboardEntry>,
    pub total_players: usize,
}

/// GET /api/v1/leaderboard/{sort}
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(sort): Path<String>,
) -> Result<Json<ApiResponse<LeaderboardResponse>>> {
    let sort_by = SortBy::from_str(&sort)?;
    let ranked = state.stats.leaderboard(sort_by).await;
    let total_players = ranked.len();

    let entries = ranked
        .into_iter()
        .enumerate()
        .map(|(i, stats)| LeaderboardEntry::from_ranked(i + 1, stats))
        .collect();

    Ok(Json(ApiResponse::success(LeaderboardResponse {
        sort_by,
        entries,
        total_players,
    })))
}
