use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    error::Result,
    models::{ApiResponse, PlayerStats, SortBy},
    services::stats_aggregator::{get_leaderboard, player_stats},
    utils::format_address,
};

use super::{require_player, AppState};

#[derive(Debug, Serialize)]
pub struct MyStatsResponse {
    pub display_address: String,
    pub stats: PlayerStats,
    /// Position on the wins leaderboard, `None` before the first recorded move.
    pub rank: Option<usize>,
    pub total_players: usize,
}

#[derive(Debug, Serialize)]
pub struct RefreshStatsResponse {
    pub players: usize,
    pub games: usize,
}

/// GET /api/v1/stats/me
pub async fn get_my_stats(State(state): State<AppState>) -> Result<Json<ApiResponse<MyStatsResponse>>> {
    let address = require_player(&state)?.to_string();
    let snapshot = state.stats.fetch_player_stats(false).await;

    let stats = player_stats(&snapshot.stats_by_address, &address)
        .cloned()
        .unwrap_or_else(|| PlayerStats::new(&address));
    let rank = get_leaderboard(&snapshot.stats_by_address, SortBy::Wins)
        .iter()
        .position(|p| p.address == address)
        .map(|i| i + 1);

    Ok(Json(ApiResponse::success(MyStatsResponse {
        display_address: format_address(&address),
        stats,
        rank,
        total_players: snapshot.stats_by_address.len(),
    })))
}

/// POST /api/v1/stats/refresh
pub async fn refresh_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RefreshStatsResponse>>> {
    state.stats.clear_stats_cache().await?;
    let snapshot = state.stats.fetch_player_stats(true).await;

    Ok(Json(ApiResponse::success(RefreshStatsResponse {
        players: snapshot.stats_by_address.len(),
        games: snapshot.games.len(),
    })))
}
