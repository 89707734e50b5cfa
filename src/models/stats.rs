use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// One settled `make-move` transaction attributed to its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub tx_id: String,
    pub player_address: String,
    pub outcome: Outcome,
    /// Unix seconds of the anchoring burn block.
    pub timestamp: i64,
    pub sequence_height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub address: String,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_rate: f64,
    pub last_played_at: i64,
}

impl PlayerStats {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            win_rate: 0.0,
            last_played_at: 0,
        }
    }
}

/// Ordered so serialized output and iteration are deterministic.
pub type StatsByAddress = BTreeMap<String, PlayerStats>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub stats_by_address: StatsByAddress,
    pub games: Vec<GameRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Wins,
    WinRate,
    GamesPlayed,
}

impl FromStr for SortBy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wins" => Ok(SortBy::Wins),
            "winRate" | "win_rate" => Ok(SortBy::WinRate),
            "gamesPlayed" | "games_played" => Ok(SortBy::GamesPlayed),
            _ => Err(AppError::BadRequest(format!("Invalid leaderboard sort: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_by_parses_both_spellings() {
        assert_eq!("winRate".parse::<SortBy>().unwrap(), SortBy::WinRate);
        assert_eq!("games_played".parse::<SortBy>().unwrap(), SortBy::GamesPlayed);
        assert!("points".parse::<SortBy>().is_err());
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_string(&Outcome::Draw).unwrap();
        assert_eq!(json, "\"draw\"");
    }
}
